use std::fmt;

/// Caller errors detected before any storage access.
///
/// Returned wrapped in `anyhow::Error`; use `err.downcast_ref::<CacheError>()`
/// to branch on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// `start` is after `end`.
    InvalidRange { start: String, end: String },
    /// The symbol cannot be used as part of a table name.
    InvalidSymbol(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidRange { start, end } => {
                write!(f, "CACHE_INVALID_RANGE: start {start} is after end {end}")
            }
            CacheError::InvalidSymbol(s) => write!(
                f,
                "CACHE_INVALID_SYMBOL: '{s}' (allowed: letters, digits, '.', '-', '^', '=')"
            ),
        }
    }
}

impl std::error::Error for CacheError {}
