// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Claude Usage Store
//!
//! Local state for the Claude usage client.
//!
//! This crate provides:
//!
//! - **WidgetSnapshotStore**: The last fetched usage, shared with widgets
//! - **SettingsStore**: The menu bar display preference with persistence
//! - **Config**: Hand-editable OAuth overrides and refresh interval
//! - **RefreshState**: Busy-flag guarded latest usage and error
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use claude_usage_store::{RefreshState, SettingsStore, WidgetSnapshotStore};
//!
//! let settings = SettingsStore::load_default().await;
//! let state = RefreshState::new();
//!
//! state.try_begin().await?;
//! let result = service.fetch_usage().await;
//! if let Ok(ref usage) = result {
//!     WidgetSnapshotStore::default().save_usage(usage).await?;
//! }
//! state.finish(result).await;
//!
//! println!("{}", settings.menu_bar_label(state.usage().await.as_ref()).await);
//! ```

pub mod config;
pub mod error;
pub mod persistence;
pub mod refresh_state;
pub mod settings_store;
pub mod widget_store;

pub use config::{Config, DEFAULT_REFRESH_INTERVAL_SECS, LogLevel, MIN_REFRESH_INTERVAL_SECS};
pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_config_path, default_settings_path, default_shared_dir,
    ensure_dir, load_json, load_json_or_default, remove_file_if_exists, save_json,
};
pub use refresh_state::RefreshState;
pub use settings_store::{MenuBarDisplay, NO_USAGE_LABEL, Settings, SettingsStore};
pub use widget_store::{
    WIDGET_SNAPSHOT_KEY, WidgetSnapshot, WidgetSnapshotStore, default_snapshot_path,
};

#[cfg(test)]
mod persistence_tests;
