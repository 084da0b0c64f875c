//! Persistence round-trip and edge case tests.
//!
//! Tests file I/O operations, JSON persistence, and snapshot compatibility.

use std::path::PathBuf;
use tempfile::TempDir;

use crate::persistence::{ensure_dir, load_json, load_json_or_default, save_json};
use crate::settings_store::{MenuBarDisplay, Settings};
use crate::widget_store::WidgetSnapshot;
use claude_usage_core::{ExtraUsage, UsageLimit, UsageResponse};

fn full_usage() -> UsageResponse {
    UsageResponse {
        five_hour: UsageLimit::new(64.0).with_resets_at("2025-06-01T15:00:00.123456+00:00"),
        seven_day: UsageLimit::new(23.0).with_resets_at("2025-06-05T00:00:00Z"),
        seven_day_opus: Some(UsageLimit::new(0.0)),
        seven_day_sonnet: Some(UsageLimit::new(11.0)),
        extra_usage: Some(ExtraUsage {
            is_enabled: Some(true),
            monthly_limit: Some(5000.0),
            used_credits: Some(1250.0),
            utilization: None,
        }),
    }
}

// ============================================================================
// JSON Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_save_and_load_json_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("test.json");

    let settings = Settings {
        menu_bar_display: MenuBarDisplay::Both,
    };

    save_json(&file_path, &settings).await.unwrap();
    let loaded: Settings = load_json(&file_path).await.unwrap();

    assert_eq!(loaded, settings);
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested_path = temp_dir
        .path()
        .join("deeply")
        .join("nested")
        .join("path")
        .join("test.json");

    let data = serde_json::json!({"key": "value"});

    save_json(&nested_path, &data).await.unwrap();
    assert!(nested_path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("private").join("snap.json");

    save_json(&file_path, &full_usage()).await.unwrap();

    let mode = std::fs::metadata(&file_path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
    let dir_mode = std::fs::metadata(file_path.parent().unwrap())
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(dir_mode, 0o700);
}

#[tokio::test]
async fn test_load_nonexistent_file() {
    let file_path = PathBuf::from("/nonexistent/path/settings.json");

    let result: Result<Settings, _> = load_json(&file_path).await;
    assert!(result.unwrap_err().is_not_found());

    let fallback: Settings = load_json_or_default(&file_path).await;
    assert_eq!(fallback, Settings::default());
}

#[tokio::test]
async fn test_ensure_dir_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir_path = temp_dir.path().join("test_dir");

    ensure_dir(&dir_path).await.unwrap();
    ensure_dir(&dir_path).await.unwrap();

    assert!(dir_path.is_dir());
}

#[tokio::test]
async fn test_atomic_write_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("atomic.json");

    save_json(&file_path, &Settings::default()).await.unwrap();
    save_json(&file_path, &Settings::default()).await.unwrap();

    assert!(!file_path.with_extension("json.tmp").exists());
    assert!(file_path.exists());
}

// ============================================================================
// Backward Compatibility Tests
// ============================================================================

#[tokio::test]
async fn test_load_settings_with_unknown_fields() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("extra_fields.json");

    let json = r#"{
        "menu_bar_display": "both",
        "unknown_field": "value",
        "nested_unknown": {"key": "value"}
    }"#;
    tokio::fs::write(&file_path, json).await.unwrap();

    let loaded: Settings = load_json(&file_path).await.unwrap();
    assert_eq!(loaded.menu_bar_display, MenuBarDisplay::Both);
}

#[tokio::test]
async fn test_snapshot_full_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("snapshot.json");

    let snapshot = WidgetSnapshot::now(full_usage());
    save_json(&file_path, &snapshot).await.unwrap();
    let loaded: WidgetSnapshot = load_json(&file_path).await.unwrap();

    assert_eq!(loaded, snapshot);
    assert_eq!(
        loaded.usage.five_hour.resets_at.as_deref(),
        Some("2025-06-01T15:00:00.123456+00:00")
    );
    assert_eq!(
        loaded.usage.extra_usage.unwrap().effective_utilization(),
        Some(25.0)
    );
}

#[tokio::test]
async fn test_snapshot_written_by_another_process() {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("snapshot.json");

    let json = r#"{
        "usage": {
            "five_hour": {"utilization": 12.0, "resets_at": null},
            "seven_day": {"utilization": 48.5}
        },
        "fetchedAt": "2025-06-01T12:00:00.5+02:00"
    }"#;
    tokio::fs::write(&file_path, json).await.unwrap();

    let loaded: WidgetSnapshot = load_json(&file_path).await.unwrap();
    assert!(loaded.usage.five_hour.resets_at.is_none());
    assert!(loaded.usage.extra_usage.is_none());
    assert_eq!(loaded.fetched_at.timestamp(), 1_748_772_000);
}
