use std::fmt;

/// Errors produced while building or applying calendar offsets.
///
/// Construction-time variants (`InvalidBarSize`, `InvalidTime`,
/// `InvalidTimezone`, `InvalidSession`) are configuration errors and are
/// expected to be fatal for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarError {
    /// The bar-size tag is not one of the supported sizes.
    InvalidBarSize(String),
    /// A wall-clock time string could not be parsed.
    InvalidTime { field: &'static str, raw: String },
    /// The timezone name is not a known IANA zone.
    InvalidTimezone(String),
    /// Session boundaries are inconsistent (or too short for the bar size).
    InvalidSession(String),
    /// A timestamp string could not be parsed.
    InvalidTimestamp(String),
    /// `start` is after `end`.
    InvalidRange { start: String, end: String },
    /// A boundary offset was asked to move zero steps.
    ZeroStep,
    /// A trading-time coordinate is not finite or is too far from the epoch.
    CoordinateOutOfRange(f64),
}

impl fmt::Display for CalendarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarError::InvalidBarSize(raw) => write!(
                f,
                "invalid bar size '{raw}'. expected one of: 1s 5s 10s 15s 30s 1m 2m 3m 5m 10m 15m 20m 30m 1h 2h 3h 4h 8h 1D 1W 1M"
            ),
            CalendarError::InvalidTime { field, raw } => {
                write!(f, "time field '{field}' could not be parsed: '{raw}'")
            }
            CalendarError::InvalidTimezone(raw) => write!(f, "unknown timezone: {raw}"),
            CalendarError::InvalidSession(msg) => write!(f, "invalid session: {msg}"),
            CalendarError::InvalidTimestamp(raw) => {
                write!(f, "timestamp could not be parsed: '{raw}'")
            }
            CalendarError::InvalidRange { start, end } => {
                write!(f, "invalid range: start {start} is after end {end}")
            }
            CalendarError::ZeroStep => write!(f, "offset step count must be non-zero"),
            CalendarError::CoordinateOutOfRange(c) => {
                write!(f, "trading-time coordinate out of range: {c}")
            }
        }
    }
}

impl std::error::Error for CalendarError {}
