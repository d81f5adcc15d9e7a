//! Cell formatting helpers

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde_json::Value;

/// Compact kubectl-style age from a creation timestamp, empty when missing
pub fn format_age(timestamp: Option<&Time>) -> String {
    let Some(Time(created)) = timestamp else {
        return String::new();
    };
    let seconds = Utc::now().signed_duration_since(*created).num_seconds().max(0);
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 60 * 60 => format!("{}m", s / 60),
        s if s < 24 * 60 * 60 => format!("{}h", s / (60 * 60)),
        s if s < 365 * 24 * 60 * 60 => format!("{}d", s / (24 * 60 * 60)),
        s => format!("{}y", s / (365 * 24 * 60 * 60)),
    }
}

/// Render a raw table cell for display
pub fn display_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Whether decoded bytes are presentable as text: valid UTF-8 consisting of
/// `\n`, `\r`, `\t` and code points at or above U+0020
pub fn is_text_like(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(text) => text
            .chars()
            .all(|c| c == '\n' || c == '\r' || c == '\t' || c >= '\u{20}'),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn time_ago(duration: Duration) -> Time {
        Time(Utc::now() - duration)
    }

    #[test]
    fn test_format_age_buckets() {
        assert_eq!(format_age(None), "");
        assert_eq!(format_age(Some(&time_ago(Duration::seconds(5)))), "5s");
        assert_eq!(format_age(Some(&time_ago(Duration::minutes(7)))), "7m");
        assert_eq!(format_age(Some(&time_ago(Duration::hours(3)))), "3h");
        assert_eq!(format_age(Some(&time_ago(Duration::days(12)))), "12d");
        assert_eq!(format_age(Some(&time_ago(Duration::days(800)))), "2y");
    }

    #[test]
    fn test_format_age_future_timestamp_clamps_to_zero() {
        assert_eq!(format_age(Some(&time_ago(Duration::seconds(-30)))), "0s");
    }

    #[test]
    fn test_display_cell() {
        use serde_json::json;
        assert_eq!(display_cell(None), "");
        assert_eq!(display_cell(Some(&json!(null))), "");
        assert_eq!(display_cell(Some(&json!("Running"))), "Running");
        assert_eq!(display_cell(Some(&json!(3))), "3");
        assert_eq!(display_cell(Some(&json!(true))), "true");
        assert_eq!(display_cell(Some(&json!(["a"]))), "[\"a\"]");
    }

    #[test]
    fn test_is_text_like() {
        assert!(is_text_like(b"plain text\nwith lines\t\r\n"));
        assert!(is_text_like("unicode ✓".as_bytes()));
        assert!(is_text_like(b""));
        assert!(!is_text_like(&[0x00, 0x01, 0x02]));
        assert!(!is_text_like(&[0xff, 0xfe]));
        assert!(!is_text_like(b"text with \x07 bell"));
    }
}
