use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// Formats accepted for naive (offset-less) timestamps, tried in order.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp into wall-clock time.
///
/// Accepts naive timestamps (`2024-06-15T00:00:00`), timestamps carrying an
/// offset (`2024-06-15T00:00:00+02:00`, the offset is dropped and the local
/// wall time kept) and plain dates, which map to midnight.
pub fn parse_iso_datetime(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let raw = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.naive_local());
    }

    let mut last_err = None;
    for format in NAIVE_FORMATS {
        match NaiveDateTime::parse_from_str(raw, format) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_err = Some(e),
        }
    }

    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(chrono::NaiveTime::MIN)),
        Err(e) => Err(last_err.unwrap_or(e)),
    }
}

/// Serde adapter for [`parse_iso_datetime`].
pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_iso_datetime(&raw).map_err(|e| {
        serde::de::Error::custom(format!("invalid ISO-8601 timestamp '{}': {}", raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_naive_timestamp() {
        let parsed = parse_iso_datetime("2024-06-15T00:00:00").unwrap();
        assert_eq!(parsed.to_string(), "2024-06-15 00:00:00");
    }

    #[test]
    fn test_parse_keeps_wall_time_of_offset_timestamp() {
        let parsed = parse_iso_datetime("2024-06-15T06:30:00+02:00").unwrap();
        assert_eq!(parsed.hour(), 6);
        assert_eq!(parsed.minute(), 30);
    }

    #[test]
    fn test_parse_space_separated_and_date_only() {
        let spaced = parse_iso_datetime("2024-06-15 12:15:00").unwrap();
        assert_eq!(spaced.hour(), 12);

        let date_only = parse_iso_datetime("2024-06-15").unwrap();
        assert_eq!(date_only.to_string(), "2024-06-15 00:00:00");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_iso_datetime("yesterday").is_err());
    }
}
