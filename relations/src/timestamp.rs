//! Event timestamps: RFC 3339, or a naive date-time taken as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(OUTPUT_FORMAT).to_string()
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{}`", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_accepted_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 24, 1, 0, 0).unwrap();
        assert_eq!(parse("2025-03-24T01:00"), Some(expected));
        assert_eq!(parse("2025-03-24 01:00:00"), Some(expected));
        assert_eq!(parse("2025-03-24T01:00:00Z"), Some(expected));
        assert_eq!(parse(" 2025-03-24T01:00:00 "), Some(expected));
    }

    #[test]
    fn test_parse_offset_is_normalised_to_utc() {
        let ts = parse("2025-03-24T03:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 1);
        assert_eq!(ts.minute(), 30);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse("yesterday"), None);
        assert_eq!(parse("2025-03-24"), None);
    }

    #[test]
    fn test_format_round_trip() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 28, 23, 59, 59).unwrap();
        assert_eq!(format(&ts), "2025-03-28 23:59:59");
        assert_eq!(parse(&format(&ts)), Some(ts));
    }

    #[test]
    fn test_format_keeps_fractional_seconds() {
        let ts = parse("2025-03-24T01:00:00.750").unwrap();
        assert_eq!(ts.nanosecond(), 750_000_000);
        assert_eq!(format(&ts), "2025-03-24 01:00:00.750");
        assert_eq!(parse(&format(&ts)), Some(ts));
    }
}
