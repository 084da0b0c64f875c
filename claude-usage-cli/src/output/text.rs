//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Local, Utc};
use claude_usage_core::{ExtraUsage, UsageError, UsageLimit, UsageTier};
use claude_usage_store::WidgetSnapshot;

use crate::output::StatusOutput;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats a fetched snapshot, headed by the menu bar label.
    pub fn format_usage(&self, snapshot: &WidgetSnapshot, label: &str) -> String {
        let usage = &snapshot.usage;
        let now = Utc::now();
        let mut lines = Vec::new();

        lines.push(format!(
            "{} {}",
            self.bold("Claude Usage"),
            self.color_for_tier(usage.primary_tier(), label)
        ));

        for (name, limit) in usage.limits() {
            lines.push(self.format_limit(name, limit, now));
        }

        if let Some(extra) = usage.extra_usage.as_ref().filter(|e| e.has_data()) {
            lines.push(self.format_extra_usage(extra));
        }

        lines.push(self.dim(&format!(
            "Updated {}",
            snapshot.fetched_at.with_timezone(&Local).format("%H:%M:%S")
        )));

        lines.join("\n")
    }

    /// Formats a usage bucket with progress bar.
    fn format_limit(&self, label: &str, limit: &UsageLimit, now: DateTime<Utc>) -> String {
        let bar = self.progress_bar(limit.utilization);
        let pct = self.color_for_tier(limit.tier(), &format!("{:.0}% used", limit.utilization));

        let mut result = format!("{:<10} {} {}", format!("{label}:"), bar, pct);

        if let Some(reset) = limit.reset_date() {
            let reset_str = format_reset_time(reset, now);
            result.push_str(&format!("\n           Resets {}", self.dim(&reset_str)));
        }

        result
    }

    /// Formats the extra usage line.
    fn format_extra_usage(&self, extra: &ExtraUsage) -> String {
        let mut parts = Vec::new();
        match (extra.used_credits, extra.monthly_limit) {
            (Some(used), Some(limit)) => parts.push(format!("{used:.0} / {limit:.0} credits")),
            (Some(used), None) => parts.push(format!("{used:.0} credits used")),
            (None, Some(limit)) => parts.push(format!("{limit:.0} credit limit")),
            (None, None) => {}
        }
        if let (Some(utilization), Some(tier)) = (extra.effective_utilization(), extra.tier()) {
            parts.push(self.color_for_tier(tier, &format!("{utilization:.0}%")));
        }
        format!("{:<10} {}", "Extra:", parts.join(" "))
    }

    /// Formats a progress bar filled to `utilization` percent.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, utilization: f64) -> String {
        let fraction = (utilization / 100.0).clamp(0.0, 1.0);
        let filled = (fraction * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_tier(UsageTier::for_utilization(utilization), &bar)
    }

    /// Formats credential status.
    pub fn format_status(&self, status: &StatusOutput) -> String {
        let mut lines = vec![self.bold("Credential")];

        lines.push(format!("Source:    {}", self.cyan(&status.source)));
        lines.push(format!("Account:   {}", status.account));
        lines.push(format!("Ownership: {}", status.ownership));

        let expiry = status.expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        if status.expired {
            let note = if status.can_refresh {
                "expired, refreshes on next fetch"
            } else {
                "expired"
            };
            lines.push(format!("Expires:   {expiry} {}", self.red(note)));
        } else {
            let remaining = Duration::seconds(status.seconds_until_expiry);
            lines.push(format!(
                "Expires:   {expiry} {}",
                self.dim(&format!("(in {})", format_duration(remaining)))
            ));
        }

        if let Some(fetched_at) = status.last_fetched_at {
            lines.push(format!(
                "Last fetch: {}",
                fetched_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            ));
        }

        lines.join("\n")
    }

    /// Formats a fetch error, with a sign-in hint when that would help.
    pub fn format_error(&self, error: &UsageError) -> String {
        let mut line = format!("{}: {error}", self.red("Error"));
        if error.supports_login_recovery() {
            line.push_str(&format!("\n{}", self.dim("Run `claude-usage login` to sign in.")));
        }
        line
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_tier(&self, tier: UsageTier, text: &str) -> String {
        match tier {
            UsageTier::Green => self.green(text),
            UsageTier::Yellow => self.yellow(text),
            UsageTier::Red => self.red(text),
        }
    }

    /// Wraps `text` in bold.
    pub fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    /// Wraps `text` in dim.
    pub fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

/// Formats a reset instant relative to `now`: a countdown within a day,
/// otherwise a local clock time.
pub fn format_reset_time(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if resets_at <= now {
        return "now".to_string();
    }

    let diff = resets_at - now;
    if diff < Duration::hours(24) {
        return format!("in {}", format_duration(diff));
    }

    let local_reset = resets_at.with_timezone(&Local);
    let today = now.with_timezone(&Local).date_naive();
    if local_reset.date_naive() == today + chrono::Days::new(1) {
        format!("tomorrow at {}", local_reset.format("%l:%M %p").to_string().trim())
    } else {
        // %e and %l pad with spaces.
        let formatted = local_reset.format("%a %b %e at %l:%M %p").to_string();
        formatted.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Formats a positive duration as `Nd Nh`, `Nh Nm` or `N minutes`.
fn format_duration(diff: Duration) -> String {
    let days = diff.num_days();
    let hours = diff.num_hours() % 24;
    let mins = diff.num_minutes() % 60;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        if mins > 0 {
            format!("{hours}h {mins}m")
        } else {
            format!("{hours} hour{}", if hours == 1 { "" } else { "s" })
        }
    } else {
        format!("{mins} minute{}", if mins == 1 { "" } else { "s" })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use claude_usage_core::{CredentialOwnership, UsageResponse};

    fn snapshot(five_hour: f64, seven_day: f64) -> WidgetSnapshot {
        WidgetSnapshot::now(UsageResponse {
            five_hour: UsageLimit::new(five_hour),
            seven_day: UsageLimit::new(seven_day),
            seven_day_opus: Some(UsageLimit::new(3.0)),
            seven_day_sonnet: None,
            extra_usage: None,
        })
    }

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false);

        let test_cases = vec![
            (0.0, "░░░░░░░░░░"),
            (10.0, "█░░░░░░░░░"),
            (25.0, "███░░░░░░░"),
            (50.0, "█████░░░░░"),
            (75.0, "████████░░"),
            (100.0, "██████████"),
            (140.0, "██████████"),
            (-5.0, "░░░░░░░░░░"),
        ];

        for (percent, expected) in test_cases {
            assert_eq!(formatter.progress_bar(percent), expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_progress_bar_colors_follow_tier() {
        let formatter = TextFormatter::new(true);
        assert!(formatter.progress_bar(10.0).contains(GREEN));
        assert!(formatter.progress_bar(60.0).contains(YELLOW));
        assert!(formatter.progress_bar(85.0).contains(RED));
    }

    #[test]
    fn test_format_usage_lists_buckets() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_usage(&snapshot(28.0, 64.0), "64%");

        assert!(output.starts_with("Claude Usage 64%"));
        assert!(output.contains("5h:"));
        assert!(output.contains("28% used"));
        assert!(output.contains("7d Opus:"));
        assert!(!output.contains("7d Sonnet"));
        assert!(!output.contains("Extra:"));
    }

    #[test]
    fn test_format_usage_with_extra() {
        let formatter = TextFormatter::new(false);
        let mut snap = snapshot(10.0, 10.0);
        snap.usage.extra_usage = Some(ExtraUsage {
            is_enabled: Some(true),
            monthly_limit: Some(2000.0),
            used_credits: Some(500.0),
            utilization: None,
        });

        let output = formatter.format_usage(&snap, "10%");
        assert!(output.contains("Extra:     500 / 2000 credits 25%"));
    }

    #[test]
    fn test_format_reset_time_countdown() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        assert_eq!(format_reset_time(now - Duration::minutes(1), now), "now");
        assert_eq!(format_reset_time(now + Duration::minutes(1), now), "in 1 minute");
        assert_eq!(format_reset_time(now + Duration::minutes(42), now), "in 42 minutes");
        assert_eq!(format_reset_time(now + Duration::hours(3), now), "in 3 hours");
        assert_eq!(
            format_reset_time(now + Duration::minutes(150), now),
            "in 2h 30m"
        );
    }

    #[test]
    fn test_format_reset_time_far_future_is_absolute() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let out = format_reset_time(now + Duration::days(4), now);
        assert!(!out.starts_with("in "));
        assert!(out.contains(" at "));
    }

    #[test]
    fn test_format_error_hint() {
        let formatter = TextFormatter::new(false);

        let expired = formatter.format_error(&UsageError::http(401, None));
        assert!(expired.contains("claude-usage login"));

        let server = formatter.format_error(&UsageError::http(500, None));
        assert_eq!(server, "Error: API returned HTTP 500");
    }

    #[test]
    fn test_format_status() {
        let formatter = TextFormatter::new(false);
        let status = StatusOutput {
            ownership: CredentialOwnership::ForeignReadOnly,
            source: "Claude Code-credentials".into(),
            account: "alice".into(),
            expires_at: Utc::now() - Duration::hours(1),
            seconds_until_expiry: -3600,
            expired: true,
            can_refresh: false,
            signed_in_app: false,
            last_fetched_at: None,
        };

        let output = formatter.format_status(&status);
        assert!(output.contains("claude-cli (read-only)"));
        assert!(output.contains("expired"));
        assert!(!output.contains("refreshes on next fetch"));
    }
}
