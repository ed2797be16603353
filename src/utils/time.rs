use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{AppError, Result};

/// Accept unix seconds, an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(input: &str) -> Result<i64> {
    let trimmed = input.trim();

    if let Ok(seconds) = trimmed.parse::<i64>() {
        return Ok(seconds);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp());
        }
    }

    Err(AppError::InvalidRequest(format!(
        "cannot parse `{trimmed}` as unix seconds, RFC 3339 or YYYY-MM-DD"
    )))
}

pub fn format_timestamp(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_formats() {
        assert_eq!(parse_timestamp("18600").unwrap(), 18_600);
        assert_eq!(parse_timestamp(" -60 ").unwrap(), -60);
        assert_eq!(parse_timestamp("1970-01-01T05:00:00Z").unwrap(), 18_000);
        assert_eq!(parse_timestamp("1970-01-01T06:00:00+01:00").unwrap(), 18_000);
        assert_eq!(parse_timestamp("1970-01-02").unwrap(), 86_400);
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn formats_in_utc() {
        assert_eq!(format_timestamp(18_000), "1970-01-01 05:00 UTC");
    }
}
