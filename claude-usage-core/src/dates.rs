//! Timestamp and duration normalization.
//!
//! Credential blobs and token responses carry expiry values in several
//! shapes depending on which tool wrote them:
//!
//! - unix seconds (`1735000000`)
//! - unix milliseconds (`1735000000000`)
//! - numeric strings of either (`"1735000000"`)
//! - ISO-8601 with or without fractional seconds (`"2025-01-01T12:00:00.123Z"`)
//!
//! Seconds and milliseconds are told apart with a fixed threshold. This is a
//! heuristic, not a provider guarantee: a seconds value later than the year
//! 2286 would be misread as milliseconds.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Numeric timestamps above this value are milliseconds since the epoch.
pub const MILLISECONDS_THRESHOLD: f64 = 10_000_000_000.0;

/// Parses an expiry value into an absolute instant.
///
/// Returns `None` for anything unparseable. Callers treat that as a fatal
/// credential error rather than substituting a default.
pub fn parse_expiry_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return from_unix_integer(int);
            }
            number.as_f64().and_then(from_unix_float)
        }
        Value::String(text) => parse_expiry_str(text),
        _ => None,
    }
}

/// Parses an expiry string: numeric first, then RFC 3339.
pub fn parse_expiry_str(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return from_unix_integer(int);
    }

    if let Some(float) = parse_finite(trimmed) {
        return from_unix_float(float);
    }

    parse_iso8601(trimmed)
}

/// Parses an ISO-8601 / RFC 3339 timestamp with or without fractional seconds.
pub fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parses a duration in seconds from a number or numeric string.
pub fn parse_time_interval(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(number) => number.as_f64().filter(|secs| secs.is_finite()),
        Value::String(text) => parse_finite(text.trim()),
        _ => None,
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[allow(clippy::cast_precision_loss)]
fn from_unix_integer(value: i64) -> Option<DateTime<Utc>> {
    if value as f64 > MILLISECONDS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn from_unix_float(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    // Work in whole microseconds so millisecond inputs stay exact.
    let micros = if value > MILLISECONDS_THRESHOLD {
        (value * 1_000.0).round()
    } else {
        (value * 1_000_000.0).round()
    };
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_threshold_boundary_integers() {
        let millis = parse_expiry_date(&json!(10_000_000_001_i64)).unwrap();
        assert_eq!(millis.timestamp(), 10_000_000);
        assert_eq!(millis.timestamp_subsec_millis(), 1);

        let secs = parse_expiry_date(&json!(9_999_999_999_i64)).unwrap();
        assert_eq!(secs.timestamp(), 9_999_999_999);
        assert_eq!(secs.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_threshold_exact_value_is_seconds() {
        let at = parse_expiry_date(&json!(10_000_000_000_i64)).unwrap();
        assert_eq!(at.timestamp(), 10_000_000_000);
    }

    #[test]
    fn test_float_milliseconds() {
        let at = parse_expiry_date(&json!(1_735_000_000_123.0)).unwrap();
        assert_eq!(at.timestamp(), 1_735_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn test_float_seconds() {
        let at = parse_expiry_date(&json!(1_735_000_000.5)).unwrap();
        assert_eq!(at.timestamp(), 1_735_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_numeric_strings() {
        let secs = parse_expiry_date(&json!("1735000000")).unwrap();
        assert_eq!(secs, Utc.timestamp_opt(1_735_000_000, 0).unwrap());

        let millis = parse_expiry_date(&json!("1735000000000")).unwrap();
        assert_eq!(millis, secs);

        let float = parse_expiry_date(&json!(" 1735000000.25 ")).unwrap();
        assert_eq!(float.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_iso8601_variants() {
        let plain = parse_expiry_date(&json!("2025-01-01T12:00:00Z")).unwrap();
        assert_eq!(plain, Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());

        let fractional = parse_expiry_date(&json!("2025-01-01T12:00:00.250Z")).unwrap();
        assert_eq!(fractional.timestamp(), plain.timestamp());
        assert_eq!(fractional.timestamp_subsec_millis(), 250);

        let offset = parse_expiry_date(&json!("2025-01-01T14:00:00+02:00")).unwrap();
        assert_eq!(offset, plain);
    }

    #[test]
    fn test_unparseable_expiry() {
        assert!(parse_expiry_date(&json!("tomorrow")).is_none());
        assert!(parse_expiry_date(&json!("")).is_none());
        assert!(parse_expiry_date(&json!("NaN")).is_none());
        assert!(parse_expiry_date(&json!("inf")).is_none());
        assert!(parse_expiry_date(&json!(null)).is_none());
        assert!(parse_expiry_date(&json!(true)).is_none());
        assert!(parse_expiry_date(&json!({"at": 1})).is_none());
    }

    #[test]
    fn test_parse_time_interval() {
        assert_eq!(parse_time_interval(&json!(3600)), Some(3600.0));
        assert_eq!(parse_time_interval(&json!(1.5)), Some(1.5));
        assert_eq!(parse_time_interval(&json!("3600")), Some(3600.0));
        assert_eq!(parse_time_interval(&json!(" 90.5 ")), Some(90.5));
        assert_eq!(parse_time_interval(&json!("soon")), None);
        assert_eq!(parse_time_interval(&json!("inf")), None);
        assert_eq!(parse_time_interval(&json!(null)), None);
        assert_eq!(parse_time_interval(&json!([3600])), None);
    }
}
