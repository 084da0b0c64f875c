//! Cross-process usage snapshot.
//!
//! The last successful fetch is written to a shared directory so widgets
//! and other companion processes can render without talking to the API.
//! Readers treat a missing or undecodable snapshot as "nothing yet".

use chrono::{DateTime, Utc};
use claude_usage_core::UsageResponse;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::error::StoreError;
use crate::persistence::{default_shared_dir, load_json, remove_file_if_exists, save_json};

/// Storage key of the snapshot. Versioned so a format change can't be
/// misread by an older reader.
pub const WIDGET_SNAPSHOT_KEY: &str = "claude_usage_widget_snapshot_v1";

/// Returns the default snapshot file path.
pub fn default_snapshot_path() -> PathBuf {
    default_shared_dir().join(format!("{WIDGET_SNAPSHOT_KEY}.json"))
}

/// Usage plus the instant it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSnapshot {
    /// The fetched usage.
    pub usage: UsageResponse,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

impl WidgetSnapshot {
    /// Creates a snapshot stamped with the current time.
    pub fn now(usage: UsageResponse) -> Self {
        Self {
            usage,
            fetched_at: Utc::now(),
        }
    }

    /// Returns how long ago the snapshot was taken.
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.fetched_at)
    }
}

/// File-backed snapshot store.
#[derive(Debug, Clone)]
pub struct WidgetSnapshotStore {
    path: PathBuf,
}

impl Default for WidgetSnapshotStore {
    fn default() -> Self {
        Self::new(default_snapshot_path())
    }
}

impl WidgetSnapshotStore {
    /// Creates a store at `path`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    #[instrument(skip(self, snapshot), fields(path = %self.path.display()))]
    pub async fn save(&self, snapshot: &WidgetSnapshot) -> Result<(), StoreError> {
        save_json(&self.path, snapshot).await?;
        debug!(fetched_at = %snapshot.fetched_at, "Widget snapshot saved");
        Ok(())
    }

    /// Saves `usage` stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub async fn save_usage(&self, usage: &UsageResponse) -> Result<WidgetSnapshot, StoreError> {
        let snapshot = WidgetSnapshot::now(usage.clone());
        self.save(&snapshot).await?;
        Ok(snapshot)
    }

    /// Loads the snapshot, if there is a readable one.
    pub async fn load(&self) -> Option<WidgetSnapshot> {
        match load_json(&self.path).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable widget snapshot");
                None
            }
        }
    }

    /// Removes the snapshot. Clearing an absent snapshot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), StoreError> {
        if remove_file_if_exists(&self.path).await? {
            debug!(path = %self.path.display(), "Widget snapshot cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use claude_usage_core::UsageLimit;

    fn sample_usage() -> UsageResponse {
        UsageResponse {
            five_hour: UsageLimit::new(42.0).with_resets_at("2025-06-01T15:00:00Z"),
            seven_day: UsageLimit::new(12.5),
            seven_day_opus: None,
            seven_day_sonnet: Some(UsageLimit::new(3.0)),
            extra_usage: None,
        }
    }

    #[test]
    fn test_default_path_uses_key() {
        let path = default_snapshot_path();
        assert!(path.ends_with("claude_usage_widget_snapshot_v1.json"));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = WidgetSnapshot {
            usage: sample_usage(),
            fetched_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["fetchedAt"], "2025-06-01T12:00:00Z");
        assert_eq!(json["usage"]["five_hour"]["utilization"], 42.0);
        assert!(json["usage"].get("seven_day_opus").is_none());
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = WidgetSnapshotStore::new(temp_dir.path().join("shared").join("snap.json"));

        assert!(store.load().await.is_none());

        let saved = store.save_usage(&sample_usage()).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, saved);
        assert!(loaded.age() >= chrono::Duration::zero());

        store.clear().await.unwrap();
        assert!(store.load().await.is_none());

        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_loads_as_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("snap.json");
        tokio::fs::write(&path, r#"{"usage": {}}"#).await.unwrap();

        let store = WidgetSnapshotStore::new(path);
        assert!(store.load().await.is_none());
    }
}
