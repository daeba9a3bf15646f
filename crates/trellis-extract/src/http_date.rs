//! HTTP date parsing.
//!
//! HTTP/1.1 recipients must accept three date formats:
//!
//! | Format | Example |
//! |---|---|
//! | RFC 1123 | `Sun, 06 Nov 1994 08:49:37 GMT` |
//! | RFC 1036 | `Sunday, 06-Nov-94 08:49:37 GMT` |
//! | ANSI C `asctime()` | `Sun Nov  6 08:49:37 1994` |
//!
//! Parsing and formatting go through [`httpdate`]. Values are exposed as
//! UTC [`DateTime`]s.

use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// The text is not a date in any HTTP date format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unparseable HTTP date: '{0}'")]
pub struct HttpDateError(String);

/// Parses an HTTP date in any of the three accepted formats.
///
/// # Example
///
/// ```rust
/// use trellis_extract::http_date::parse_http_date;
///
/// let a = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
/// let b = parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
/// let c = parse_http_date("Sun Nov  6 08:49:37 1994").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(b, c);
/// ```
pub fn parse_http_date(text: &str) -> Result<DateTime<Utc>, HttpDateError> {
    let text = text.trim();
    httpdate::parse_http_date(text)
        .map(DateTime::<Utc>::from)
        .map_err(|_| HttpDateError(text.to_string()))
}

/// Formats a date in RFC 1123 format.
///
/// Dates before the Unix epoch are formatted as the epoch.
#[must_use]
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    let time = SystemTime::from(*date).max(UNIX_EPOCH);
    httpdate::fmt_http_date(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    #[test]
    fn test_all_formats_parse_to_same_instant() {
        for text in [
            "Sun, 06 Nov 1994 08:49:37 GMT",
            "Sunday, 06-Nov-94 08:49:37 GMT",
            "Sun Nov  6 08:49:37 1994",
            "  Sun, 06 Nov 1994 08:49:37 GMT ",
        ] {
            assert_eq!(parse_http_date(text), Ok(expected()), "{text}");
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_http_date("yesterday").is_err());
        assert!(parse_http_date("").is_err());
        assert_eq!(
            parse_http_date("06/11/1994").unwrap_err().to_string(),
            "Unparseable HTTP date: '06/11/1994'"
        );
    }

    #[test]
    fn test_format_uses_rfc_1123() {
        assert_eq!(format_http_date(&expected()), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_format_clamps_before_epoch() {
        let early = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_http_date(&early), "Thu, 01 Jan 1970 00:00:00 GMT");
    }
}
