//! Timestamp parsing and validation utilities.
//!
//! Segment times are `HH:MM:SS.mmm` strings. The backend treats them as
//! opaque unless strict validation is enabled, in which case these helpers
//! check the format and the start/end ordering.

use thiserror::Error;

/// Timestamp parsing/validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Invalid timestamp format '{0}'. Use HH:MM:SS.mmm")]
    InvalidFormat(String),

    #[error("Invalid {0} value in '{1}'")]
    OutOfRange(&'static str, String),

    #[error("Start time {start} is after end time {end}")]
    StartAfterEnd { start: String, end: String },
}

/// Parse an `HH:MM:SS.mmm` timestamp into milliseconds.
///
/// Hours, minutes and seconds are two zero-padded digits, milliseconds are
/// exactly three digits. Minutes and seconds must be below 60.
///
/// # Examples
/// ```
/// use roboseg_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("00:01:12.345").unwrap(), 72_345);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<u64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let invalid = || TimestampError::InvalidFormat(ts.to_string());

    let (clock, millis) = ts.split_once('.').ok_or_else(invalid)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 || millis.len() != 3 {
        return Err(invalid());
    }

    let digits = |s: &str, width: usize| -> Result<u64, TimestampError> {
        if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        s.parse().map_err(|_| invalid())
    };

    let hours = digits(parts[0], 2)?;
    let minutes = digits(parts[1], 2)?;
    let seconds = digits(parts[2], 2)?;
    let millis = digits(millis, 3)?;

    if minutes >= 60 {
        return Err(TimestampError::OutOfRange("minutes", ts.to_string()));
    }
    if seconds >= 60 {
        return Err(TimestampError::OutOfRange("seconds", ts.to_string()));
    }

    Ok(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

/// Validate a segment's start/end pair.
///
/// Both times must parse and the start must not be after the end.
pub fn validate_segment_times(start: &str, end: &str) -> Result<(u64, u64), TimestampError> {
    let start_ms = parse_timestamp(start)?;
    let end_ms = parse_timestamp(end)?;

    if start_ms > end_ms {
        return Err(TimestampError::StartAfterEnd {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok((start_ms, end_ms))
}

/// Format milliseconds as `HH:MM:SS.mmm`.
pub fn format_millis(total_ms: u64) -> String {
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
