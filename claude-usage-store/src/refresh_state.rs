//! Latest-fetch state shared between a refresh loop and its readers.
//!
//! [`RefreshState`] serializes fetches with a busy flag: a second
//! [`try_begin`](RefreshState::try_begin) while one is in flight fails
//! instead of queueing. Readers subscribe to a version counter and re-read
//! whatever changed.

use chrono::{DateTime, Utc};
use claude_usage_core::{UsageError, UsageResponse};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

use crate::error::StoreError;

#[derive(Debug, Default)]
struct RefreshStateInner {
    usage: Option<UsageResponse>,
    last_error: Option<UsageError>,
    last_updated: Option<DateTime<Utc>>,
    in_progress: bool,
}

/// Busy-flag guarded holder of the latest usage and error.
#[derive(Debug, Clone)]
pub struct RefreshState {
    inner: Arc<RwLock<RefreshStateInner>>,
    notify: watch::Sender<u64>,
    version: Arc<RwLock<u64>>,
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshState {
    /// Creates an empty state.
    pub fn new() -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(RefreshStateInner::default())),
            notify,
            version: Arc::new(RwLock::new(0)),
        }
    }

    // ========================================================================
    // Refresh Management
    // ========================================================================

    /// Marks a fetch as in flight.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RefreshInProgress`] if one already is.
    pub async fn try_begin(&self) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write().await;
            if inner.in_progress {
                debug!("Refresh skipped, one already in flight");
                return Err(StoreError::RefreshInProgress);
            }
            inner.in_progress = true;
        }
        self.notify_change().await;
        Ok(())
    }

    /// Records the outcome of the in-flight fetch and clears the busy flag.
    ///
    /// Success replaces the usage and clears the error. Failure records the
    /// error and keeps the last good usage.
    pub async fn finish(&self, result: Result<UsageResponse, UsageError>) {
        {
            let mut inner = self.inner.write().await;
            inner.in_progress = false;
            match result {
                Ok(usage) => {
                    inner.usage = Some(usage);
                    inner.last_error = None;
                    inner.last_updated = Some(Utc::now());
                }
                Err(error) => {
                    warn!(error = %error, "Usage refresh failed");
                    inner.last_error = Some(error);
                }
            }
        }
        self.notify_change().await;
    }

    /// Returns true while a fetch is in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.inner.read().await.in_progress
    }

    /// Forgets usage and error, e.g. after sign-out.
    ///
    /// An in-flight fetch keeps its busy flag; its result still lands via
    /// [`finish`](Self::finish).
    pub async fn clear(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.usage = None;
            inner.last_error = None;
            inner.last_updated = None;
        }
        self.notify_change().await;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the last successfully fetched usage.
    pub async fn usage(&self) -> Option<UsageResponse> {
        self.inner.read().await.usage.clone()
    }

    /// Returns the error from the most recent fetch, if it failed.
    pub async fn last_error(&self) -> Option<UsageError> {
        self.inner.read().await.last_error.clone()
    }

    /// Returns when usage was last updated successfully.
    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_updated
    }

    /// Returns true if the last error can be fixed by signing in.
    pub async fn should_offer_login(&self) -> bool {
        self.inner
            .read()
            .await
            .last_error
            .as_ref()
            .is_some_and(UsageError::supports_login_recovery)
    }

    // ========================================================================
    // Observable
    // ========================================================================

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    async fn notify_change(&self) {
        let mut version = self.version.write().await;
        *version += 1;
        let _ = self.notify.send(*version);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use claude_usage_core::UsageLimit;

    fn usage(five_hour: f64) -> UsageResponse {
        UsageResponse {
            five_hour: UsageLimit::new(five_hour),
            seven_day: UsageLimit::new(1.0),
            seven_day_opus: None,
            seven_day_sonnet: None,
            extra_usage: None,
        }
    }

    #[tokio::test]
    async fn test_busy_flag() {
        let state = RefreshState::new();
        assert!(!state.is_refreshing().await);

        state.try_begin().await.unwrap();
        assert!(state.is_refreshing().await);
        assert!(matches!(
            state.try_begin().await,
            Err(StoreError::RefreshInProgress)
        ));

        state.finish(Ok(usage(10.0))).await;
        assert!(!state.is_refreshing().await);
        state.try_begin().await.unwrap();
    }

    #[tokio::test]
    async fn test_success_clears_error() {
        let state = RefreshState::new();

        state.try_begin().await.unwrap();
        state.finish(Err(UsageError::TokenMissing)).await;
        assert_eq!(state.last_error().await, Some(UsageError::TokenMissing));
        assert!(state.last_updated().await.is_none());

        state.try_begin().await.unwrap();
        state.finish(Ok(usage(20.0))).await;
        assert!(state.last_error().await.is_none());
        assert!(state.last_updated().await.is_some());
        assert_eq!(state.usage().await, Some(usage(20.0)));
    }

    #[tokio::test]
    async fn test_failure_keeps_last_usage() {
        let state = RefreshState::new();

        state.try_begin().await.unwrap();
        state.finish(Ok(usage(30.0))).await;
        let updated = state.last_updated().await;

        state.try_begin().await.unwrap();
        state
            .finish(Err(UsageError::Network("offline".into())))
            .await;

        assert_eq!(state.usage().await, Some(usage(30.0)));
        assert_eq!(state.last_updated().await, updated);
        assert!(!state.should_offer_login().await);
    }

    #[tokio::test]
    async fn test_should_offer_login() {
        let state = RefreshState::new();
        assert!(!state.should_offer_login().await);

        state.try_begin().await.unwrap();
        state.finish(Err(UsageError::http(401, None))).await;
        assert!(state.should_offer_login().await);

        state.try_begin().await.unwrap();
        state.finish(Err(UsageError::http(500, None))).await;
        assert!(!state.should_offer_login().await);

        state.try_begin().await.unwrap();
        state.finish(Err(UsageError::KeychainNotFound)).await;
        assert!(state.should_offer_login().await);
    }

    #[tokio::test]
    async fn test_clear() {
        let state = RefreshState::new();
        state.try_begin().await.unwrap();
        state.finish(Ok(usage(40.0))).await;

        state.clear().await;
        assert!(state.usage().await.is_none());
        assert!(state.last_updated().await.is_none());
        assert!(!state.should_offer_login().await);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = RefreshState::new();
        let mut rx = state.subscribe();

        state.try_begin().await.unwrap();
        state.finish(Ok(usage(5.0))).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
    }
}
