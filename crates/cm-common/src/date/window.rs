use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Longest request window accepted; keeps per-day overlap scans bounded.
pub const MAX_WINDOW_DAYS: i64 = 31;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WindowError {
    #[error("unrecognised timestamp {0:?}; expected ISO-8601")]
    InvalidTimestamp(String),
    #[error("end must be after start")]
    EndBeforeStart,
    #[error("window longer than 31 days")]
    TooLong,
}

/// RFC 3339 with offset, or a naive `YYYY-MM-DD[T ]HH:MM[:SS]` read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, WindowError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| WindowError::InvalidTimestamp(trimmed.to_string()))
}

/// A validated `[start, end)` interval in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl RequestWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if end <= start {
            return Err(WindowError::EndBeforeStart);
        }
        if end - start > Duration::days(MAX_WINDOW_DAYS) {
            return Err(WindowError::TooLong);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
