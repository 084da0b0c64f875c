//! User preferences store.
//!
//! There is exactly one preference: what the menu bar label shows. The
//! store keeps it behind an async lock, persists it as JSON and notifies
//! subscribers when it changes.

use claude_usage_core::UsageResponse;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json, save_json};

// ============================================================================
// Settings Types
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// What the menu bar label shows.
    pub menu_bar_display: MenuBarDisplay,
}

/// What the compact status label shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MenuBarDisplay {
    /// The higher of the 5-hour and 7-day windows.
    #[default]
    Primary,
    /// Both windows, 5-hour first.
    Both,
}

/// Placeholder shown before the first successful fetch.
pub const NO_USAGE_LABEL: &str = "—";

impl MenuBarDisplay {
    /// Renders the label for `usage`.
    ///
    /// Percentages are truncated toward zero, so 79.9% reads as `79%` and
    /// never overstates consumption.
    pub fn label(self, usage: Option<&UsageResponse>) -> String {
        let Some(usage) = usage else {
            return NO_USAGE_LABEL.to_string();
        };
        match self {
            Self::Primary => format_percent(usage.primary_utilization()),
            Self::Both => format!(
                "{} · {}",
                format_percent(usage.five_hour.utilization),
                format_percent(usage.seven_day.utilization)
            ),
        }
    }

    /// Returns all variants.
    pub fn all() -> &'static [MenuBarDisplay] {
        &[Self::Primary, Self::Both]
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_percent(utilization: f64) -> String {
    format!("{}%", utilization.trunc() as i64)
}

impl std::fmt::Display for MenuBarDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for MenuBarDisplay {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "both" => Ok(Self::Both),
            other => Err(StoreError::Config(format!(
                "unknown menu bar display '{other}' (expected 'primary' or 'both')"
            ))),
        }
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Thread-safe settings holder with persistence.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
    notify: watch::Sender<u64>,
    version: Arc<RwLock<u64>>,
}

impl SettingsStore {
    /// Creates a store with default settings, persisting to `path`.
    pub fn new(path: PathBuf) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            settings: Arc::new(RwLock::new(Settings::default())),
            path,
            notify,
            version: Arc::new(RwLock::new(0)),
        }
    }

    /// Loads settings from the default path.
    pub async fn load_default() -> Self {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from a path.
    ///
    /// A missing or unreadable file yields defaults.
    pub async fn load(path: PathBuf) -> Self {
        let settings = match load_json(&path).await {
            Ok(settings) => {
                info!(path = %path.display(), "Loaded settings");
                settings
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "Settings file not found, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load settings, using defaults");
                Settings::default()
            }
        };

        let store = Self::new(path);
        *store.settings.write().await = settings;
        store
    }

    /// Returns the file this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Updates settings and notifies subscribers.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        {
            let mut settings = self.settings.write().await;
            f(&mut settings);
        }
        self.notify_change().await;
    }

    /// Saves settings to disk.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        let settings = self.settings.read().await.clone();
        save_json(&self.path, &settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Resets to defaults and notifies subscribers. Does not save.
    pub async fn reset(&self) {
        self.update(|s| *s = Settings::default()).await;
    }

    /// Subscribes to settings changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    async fn notify_change(&self) {
        let mut version = self.version.write().await;
        *version += 1;
        let _ = self.notify.send(*version);
    }

    // ========================================================================
    // Convenience Methods
    // ========================================================================

    /// Gets the menu bar display mode.
    pub async fn menu_bar_display(&self) -> MenuBarDisplay {
        self.settings.read().await.menu_bar_display
    }

    /// Sets the menu bar display mode.
    pub async fn set_menu_bar_display(&self, display: MenuBarDisplay) {
        self.update(|s| s.menu_bar_display = display).await;
    }

    /// Renders the menu bar label for `usage` with the current mode.
    pub async fn menu_bar_label(&self, usage: Option<&UsageResponse>) -> String {
        self.menu_bar_display().await.label(usage)
    }
}
