//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use claude_usage_core::{CredentialOwnership, UsageResponse};
use claude_usage_fetch::CredentialStatus;
use claude_usage_store::WidgetSnapshot;
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a usage fetch: the API payload plus when it was fetched.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOutput<'a> {
    #[serde(flatten)]
    pub usage: &'a UsageResponse,
    pub fetched_at: DateTime<Utc>,
    pub menu_bar_label: String,
}

/// Credential status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub ownership: CredentialOwnership,
    pub source: String,
    pub account: String,
    pub expires_at: DateTime<Utc>,
    pub seconds_until_expiry: i64,
    pub expired: bool,
    /// Whether a fetch would refresh this credential itself.
    pub can_refresh: bool,
    pub signed_in_app: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl StatusOutput {
    /// Builds the output from a status report taken at `now`.
    pub fn new(
        status: &CredentialStatus,
        now: DateTime<Utc>,
        signed_in_app: bool,
        last_snapshot: Option<&WidgetSnapshot>,
    ) -> Self {
        Self {
            ownership: status.ownership,
            source: status.service.clone(),
            account: status.account.clone(),
            expires_at: status.expires_at,
            seconds_until_expiry: status.seconds_until_expiry(now),
            expired: status.is_expired(now),
            can_refresh: status.ownership.may_rotate(),
            signed_in_app,
            last_fetched_at: last_snapshot.map(|s| s.fetched_at),
        }
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a fetched snapshot.
    pub fn format_usage(&self, snapshot: &WidgetSnapshot, label: &str) -> Result<String> {
        self.format(&UsageOutput {
            usage: &snapshot.usage,
            fetched_at: snapshot.fetched_at,
            menu_bar_label: label.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use claude_usage_core::UsageLimit;
    use serde_json::Value;

    #[test]
    fn test_usage_output_is_flat() {
        let snapshot = WidgetSnapshot {
            usage: UsageResponse {
                five_hour: UsageLimit::new(12.0).with_resets_at("2025-06-01T15:00:00Z"),
                seven_day: UsageLimit::new(40.0),
                seven_day_opus: None,
                seven_day_sonnet: None,
                extra_usage: None,
            },
            fetched_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        };

        let json = JsonFormatter::new(false).format_usage(&snapshot, "40%").unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["five_hour"]["utilization"], 12.0);
        assert_eq!(value["five_hour"]["resets_at"], "2025-06-01T15:00:00Z");
        assert_eq!(value["fetchedAt"], "2025-06-01T12:00:00Z");
        assert_eq!(value["menuBarLabel"], "40%");
        assert!(value.get("seven_day_opus").is_none());
    }

    #[test]
    fn test_status_output() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let status = CredentialStatus {
            ownership: CredentialOwnership::OwnedByApp,
            service: "Claude Code-credentials".into(),
            account: "claude-usage-in-app-oauth".into(),
            expires_at: now + Duration::minutes(90),
        };

        let output = StatusOutput::new(&status, now, true, None);
        assert_eq!(output.seconds_until_expiry, 5400);
        assert!(!output.expired);
        assert!(output.can_refresh);

        let value: Value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["secondsUntilExpiry"], 5400);
        assert_eq!(value["signedInApp"], true);
        assert!(value.get("lastFetchedAt").is_none());
    }

    #[test]
    fn test_pretty_output() {
        let formatter = JsonFormatter::new(true);
        let json = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert!(json.contains('\n'));
    }
}
