//! Two-field record parsing for polled resources.
//!
//! Each non-blank line is `timestamp,value`. The timestamp is either a calendar time
//! (`2025-10-19 17:50:21.143882`, `2025-10-19T17:50:21Z`, `2025/10/19 17:50:21`, ...) or a
//! plain number taken as milliseconds since the epoch. Calendar times without an offset
//! are read as UTC. Malformed lines are skipped one by one.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::core::series_buffer::SeriesPoint;
use crate::errors::{FeedError, FeedResult};

const CALENDAR_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A `/`, `T` or `:` anywhere past the first character, or a `-` there that is not an
/// exponent sign (`1.5e-3`), marks a calendar timestamp. A leading `-` is a sign.
fn looks_like_calendar(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.iter().enumerate().skip(1).any(|(i, byte)| match byte {
        b'/' | b'T' | b':' => true,
        b'-' => !matches!(bytes[i - 1], b'e' | b'E'),
        _ => false,
    })
}

fn parse_calendar(raw: &str) -> Option<i64> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.timestamp_millis());
    }
    for format in CALENDAR_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
}

fn parse_numeric(raw: &str) -> Option<i64> {
    if let Ok(whole) = raw.parse::<i64>() {
        return Some(whole);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|ms| ms.is_finite() && *ms >= i64::MIN as f64 && *ms <= i64::MAX as f64)
        .map(|ms| ms as i64)
}

fn clean(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}

/// Parses a raw timestamp field to milliseconds since the epoch.
pub fn parse_timestamp(raw: &str, line: usize) -> FeedResult<i64> {
    let raw = clean(raw);
    let parsed = if looks_like_calendar(raw) {
        parse_calendar(raw)
    } else {
        parse_numeric(raw)
    };
    parsed.ok_or_else(|| FeedError::Parse {
        line,
        reason: format!("unrecognised timestamp '{}'", raw),
    })
}

/// Parses a raw value field. Non-finite values are rejected so that equality checks on
/// parsed data stay meaningful.
pub fn parse_value(raw: &str, line: usize) -> FeedResult<f64> {
    let raw = clean(raw);
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(FeedError::Parse {
            line,
            reason: format!("value '{}' is not a finite number", raw),
        }),
    }
}

/// Parses one `timestamp,value` line. `line` is 1-based and only used for reporting.
pub fn parse_record(text: &str, line: usize) -> FeedResult<SeriesPoint> {
    let mut fields = text.split(',');
    let (Some(raw_ts), Some(raw_value)) = (fields.next(), fields.next()) else {
        return Err(FeedError::Parse {
            line,
            reason: "expected two comma separated fields".to_string(),
        });
    };
    let timestamp = parse_timestamp(raw_ts, line)?;
    let value = parse_value(raw_value, line)?;
    Ok(SeriesPoint::new(timestamp, value))
}

/// Parses a whole resource in file order, keeping only the last `max_points` records.
pub fn parse_rows(contents: &str, max_points: usize) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = Vec::new();
    for (index, text) in contents.lines().enumerate() {
        if text.trim().is_empty() {
            continue;
        }
        match parse_record(text, index + 1) {
            Ok(point) => points.push(point),
            Err(e) => debug!("Skipping record: {}", e),
        }
    }
    if points.len() > max_points {
        let excess = points.len() - max_points;
        points.drain(..excess);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_and_numeric_forms_both_yield_milliseconds() {
        let calendar = parse_record("2025-10-19 17:50:21.143882,10.5", 1).unwrap();
        let numeric = parse_record("1697740221143,10.5", 2).unwrap();

        assert_eq!(calendar, SeriesPoint::new(1_760_896_221_143, 10.5));
        assert_eq!(numeric, SeriesPoint::new(1_697_740_221_143, 10.5));
    }

    #[test]
    fn calendar_variants() {
        assert_eq!(parse_timestamp("2025-10-19 17:50:21", 1).unwrap(), 1_760_896_221_000);
        assert_eq!(parse_timestamp("2025-10-19T17:50:21.143Z", 1).unwrap(), 1_760_896_221_143);
        assert_eq!(parse_timestamp("2025-10-19T17:50:21+02:00", 1).unwrap(), 1_760_889_021_000);
        assert_eq!(parse_timestamp("2025/10/19 17:50:21", 1).unwrap(), 1_760_896_221_000);
        assert_eq!(parse_timestamp("2025-10-19", 1).unwrap(), 1_760_832_000_000);
    }

    #[test]
    fn numeric_timestamps_accept_floats() {
        assert_eq!(parse_timestamp(" 1697740221143.9 ", 1).unwrap(), 1_697_740_221_143);
        assert_eq!(parse_timestamp("\"42\"", 1).unwrap(), 42);
    }

    #[test]
    fn separators_pick_the_calendar_form() {
        assert!(looks_like_calendar("2025-10-19"));
        assert!(looks_like_calendar("2025/10/19 17:50"));
        assert!(looks_like_calendar("20251019T175021"));
        assert!(looks_like_calendar("17:50:21"));
        assert!(!looks_like_calendar("-1500"));
        assert!(!looks_like_calendar("1.7e-3"));
        assert!(!looks_like_calendar("1697740221143"));

        assert_eq!(parse_timestamp("-1500", 1).unwrap(), -1500);
        assert_eq!(parse_timestamp("1.6977402211e12", 1).unwrap(), 1_697_740_221_100);
        // Calendar-like but in no known format.
        assert!(parse_timestamp("17:50:21", 1).is_err());
        assert!(parse_timestamp("19-10", 1).is_err());
    }

    #[test]
    fn malformed_records_are_parse_errors() {
        assert!(matches!(
            parse_record("1697740221143,abc", 4),
            Err(FeedError::Parse { line: 4, .. })
        ));
        assert!(parse_record("2025-13-45 99:00:00,1.0", 1).is_err());
        assert!(parse_record("yesterday,1.0", 1).is_err());
        assert!(parse_record("1697740221143", 1).is_err());
        assert!(parse_record("1697740221143,NaN", 1).is_err());
    }

    #[test]
    fn bad_rows_are_skipped_without_aborting() {
        let contents = "timestamp,value\n\
                        1000,1.5\n\
                        2000,not-a-number\n\
                        \n\
                        2025-10-19 17:50:21.143882,10.5\n\
                        3000,3.5\n";
        let points = parse_rows(contents, 1000);
        assert_eq!(
            points,
            vec![
                SeriesPoint::new(1000, 1.5),
                SeriesPoint::new(1_760_896_221_143, 10.5),
                SeriesPoint::new(3000, 3.5),
            ]
        );
    }

    #[test]
    fn file_order_is_kept() {
        let points = parse_rows("3,1\n1,2\n2,3\n", 10);
        let stamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![3, 1, 2]);
    }

    #[test]
    fn truncates_from_the_head() {
        let contents: String = (0..1500).map(|i| format!("{},{}.0\n", i, i)).collect();
        let points = parse_rows(&contents, 1000);

        assert_eq!(points.len(), 1000);
        assert_eq!(points.first().unwrap().timestamp, 500);
        assert_eq!(points.last().unwrap().timestamp, 1499);
        assert!(points.windows(2).all(|w| w[0].timestamp + 1 == w[1].timestamp));
    }

    #[test]
    fn windows_line_endings() {
        let points = parse_rows("1,1.0\r\n2,2.0\r\n", 10);
        assert_eq!(points.len(), 2);
    }
}
