//! Usage-related types.
//!
//! This module mirrors the response of `GET /api/oauth/usage`:
//! - [`UsageResponse`] - All rate-limit buckets for the account
//! - [`UsageLimit`] - A single bucket (5-hour, 7-day, per-model)
//! - [`ExtraUsage`] - Optional overage credits
//! - [`UsageTier`] - Green/yellow/red severity banding

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::parse_iso8601;

// ============================================================================
// Usage Response
// ============================================================================

/// Rate-limit usage for the signed-in account.
///
/// Created fresh per successful fetch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageResponse {
    /// Rolling 5-hour session window.
    pub five_hour: UsageLimit,
    /// Rolling 7-day window across all models.
    pub seven_day: UsageLimit,
    /// 7-day window for Opus models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seven_day_opus: Option<UsageLimit>,
    /// 7-day window for Sonnet models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seven_day_sonnet: Option<UsageLimit>,
    /// Overage credits beyond the plan's rate limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_usage: Option<ExtraUsage>,
}

impl UsageResponse {
    /// Returns the headline utilization: the higher of the 5-hour and 7-day windows.
    pub fn primary_utilization(&self) -> f64 {
        self.five_hour.utilization.max(self.seven_day.utilization)
    }

    /// Returns the tier of [`primary_utilization`](Self::primary_utilization).
    pub fn primary_tier(&self) -> UsageTier {
        UsageTier::for_utilization(self.primary_utilization())
    }

    /// Returns every populated bucket with a short display label, in display order.
    pub fn limits(&self) -> Vec<(&'static str, &UsageLimit)> {
        let mut limits = vec![("5h", &self.five_hour), ("7d", &self.seven_day)];
        if let Some(ref opus) = self.seven_day_opus {
            limits.push(("7d Opus", opus));
        }
        if let Some(ref sonnet) = self.seven_day_sonnet {
            limits.push(("7d Sonnet", sonnet));
        }
        limits
    }
}

// ============================================================================
// Usage Limit
// ============================================================================

/// A single rate-limit bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLimit {
    /// Percentage of the bucket consumed. Can exceed 100.
    pub utilization: f64,
    /// When the bucket resets, as the raw timestamp string from the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<String>,
}

impl UsageLimit {
    /// Creates a bucket with the given utilization and no reset time.
    pub fn new(utilization: f64) -> Self {
        Self {
            utilization,
            resets_at: None,
        }
    }

    /// Sets the reset timestamp.
    #[must_use]
    pub fn with_resets_at(mut self, resets_at: impl Into<String>) -> Self {
        self.resets_at = Some(resets_at.into());
        self
    }

    /// Returns the severity tier for this bucket.
    pub fn tier(&self) -> UsageTier {
        UsageTier::for_utilization(self.utilization)
    }

    /// Parses [`resets_at`](Self::resets_at). `None` if absent or unparseable.
    pub fn reset_date(&self) -> Option<DateTime<Utc>> {
        self.resets_at.as_deref().and_then(parse_iso8601)
    }
}

// ============================================================================
// Extra Usage
// ============================================================================

/// Overage credits charged once the plan's rate limits are exhausted.
///
/// Amounts are in credit units; currency formatting is left to the display layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraUsage {
    /// Whether extra usage is turned on for the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    /// Monthly credit limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<f64>,
    /// Credits used this month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_credits: Option<f64>,
    /// Percentage of the monthly limit used, when the API reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
}

impl ExtraUsage {
    /// Returns the utilization, computing it from credits when not reported.
    pub fn effective_utilization(&self) -> Option<f64> {
        if let Some(utilization) = self.utilization {
            return Some(utilization);
        }
        match (self.used_credits, self.monthly_limit) {
            (Some(used), Some(limit)) if limit > 0.0 => Some(used / limit * 100.0),
            _ => None,
        }
    }

    /// Returns true if there is anything worth showing.
    pub fn has_data(&self) -> bool {
        if self.is_enabled == Some(false) {
            return false;
        }
        self.monthly_limit.is_some() || self.used_credits.is_some() || self.utilization.is_some()
    }

    /// Returns the tier of the effective utilization, if any.
    pub fn tier(&self) -> Option<UsageTier> {
        self.effective_utilization().map(UsageTier::for_utilization)
    }
}

// ============================================================================
// Usage Tier
// ============================================================================

/// Three-level severity banding derived from utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageTier {
    /// Below 50%.
    Green,
    /// 50% up to (not including) 80%.
    Yellow,
    /// 80% and above.
    Red,
}

impl UsageTier {
    /// Bands a utilization percentage.
    pub fn for_utilization(utilization: f64) -> Self {
        if utilization < 50.0 {
            Self::Green
        } else if utilization < 80.0 {
            Self::Yellow
        } else {
            Self::Red
        }
    }
}

impl std::fmt::Display for UsageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Green => write!(f, "green"),
            Self::Yellow => write!(f, "yellow"),
            Self::Red => write!(f, "red"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(UsageLimit::new(0.0).tier(), UsageTier::Green);
        assert_eq!(UsageLimit::new(49.999).tier(), UsageTier::Green);
        assert_eq!(UsageLimit::new(50.0).tier(), UsageTier::Yellow);
        assert_eq!(UsageLimit::new(79.999).tier(), UsageTier::Yellow);
        assert_eq!(UsageLimit::new(80.0).tier(), UsageTier::Red);
        assert_eq!(UsageLimit::new(140.0).tier(), UsageTier::Red);
    }

    #[test]
    fn test_reset_date_parsing() {
        let limit = UsageLimit::new(10.0).with_resets_at("2025-01-01T12:00:00Z");
        assert!(limit.reset_date().is_some());

        let fractional = UsageLimit::new(10.0).with_resets_at("2025-01-01T12:00:00.512345+00:00");
        assert_eq!(
            fractional.reset_date().unwrap().timestamp(),
            limit.reset_date().unwrap().timestamp()
        );

        let garbage = UsageLimit::new(10.0).with_resets_at("next tuesday");
        assert!(garbage.reset_date().is_none());

        assert!(UsageLimit::new(10.0).reset_date().is_none());
    }

    #[test]
    fn test_effective_utilization_computed() {
        let extra = ExtraUsage {
            used_credits: Some(50.0),
            monthly_limit: Some(200.0),
            ..Default::default()
        };
        assert_eq!(extra.effective_utilization(), Some(25.0));
    }

    #[test]
    fn test_effective_utilization_zero_limit() {
        let extra = ExtraUsage {
            used_credits: Some(50.0),
            monthly_limit: Some(0.0),
            ..Default::default()
        };
        assert_eq!(extra.effective_utilization(), None);
    }

    #[test]
    fn test_effective_utilization_prefers_explicit() {
        let extra = ExtraUsage {
            used_credits: Some(50.0),
            monthly_limit: Some(200.0),
            utilization: Some(31.0),
            ..Default::default()
        };
        assert_eq!(extra.effective_utilization(), Some(31.0));
    }

    #[test]
    fn test_has_data() {
        assert!(!ExtraUsage::default().has_data());

        let disabled = ExtraUsage {
            is_enabled: Some(false),
            used_credits: Some(5.0),
            ..Default::default()
        };
        assert!(!disabled.has_data());

        let enabled_only = ExtraUsage {
            is_enabled: Some(true),
            ..Default::default()
        };
        assert!(!enabled_only.has_data());

        let with_limit = ExtraUsage {
            monthly_limit: Some(100.0),
            ..Default::default()
        };
        assert!(with_limit.has_data());
    }

    #[test]
    fn test_primary_utilization_is_max_of_windows() {
        let usage = UsageResponse {
            five_hour: UsageLimit::new(35.0),
            seven_day: UsageLimit::new(82.0),
            seven_day_opus: Some(UsageLimit::new(99.0)),
            seven_day_sonnet: None,
            extra_usage: None,
        };
        assert!((usage.primary_utilization() - 82.0).abs() < f64::EPSILON);
        assert_eq!(usage.primary_tier(), UsageTier::Red);
    }

    #[test]
    fn test_limits_order_and_labels() {
        let usage = UsageResponse {
            five_hour: UsageLimit::new(1.0),
            seven_day: UsageLimit::new(2.0),
            seven_day_opus: None,
            seven_day_sonnet: Some(UsageLimit::new(100.0)),
            extra_usage: None,
        };
        let labels: Vec<_> = usage.limits().iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec!["5h", "7d", "7d Sonnet"]);
    }
}
