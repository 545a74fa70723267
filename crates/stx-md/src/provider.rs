//! Provider boundary for historical OHLCV bars.
//!
//! This module defines only the request type, the error type, and the provider
//! trait. Concrete providers live elsewhere (CSV in [`crate::csv_source`];
//! network clients are external collaborators).

use std::fmt;

use anyhow::Result;
use chrono::DateTime;
use chrono_tz::Tz;
use stx_cache::Bar;
use stx_calendar::BarSize;

// ---------------------------------------------------------------------------
// Fetch request
// ---------------------------------------------------------------------------

/// Parameters for one historical fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Normalized (uppercase) ticker.
    pub symbol: String,
    pub bar_size: BarSize,
    /// Inclusive start.
    pub start: DateTime<Tz>,
    /// Exclusive end (a chunk boundary).
    pub end: DateTime<Tz>,
}

impl FetchRequest {
    pub fn contains(&self, t: &DateTime<Tz>) -> bool {
        self.start <= *t && *t < self.end
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that a [`HistoricalProvider`] implementation may return (wrapped in
/// `anyhow::Error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network, file, or transport failure.
    Transport(String),
    /// A response payload could not be decoded.
    Decode(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "provider transport error: {msg}"),
            ProviderError::Decode(msg) => write!(f, "provider decode error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Pluggable historical provider interface.
#[async_trait::async_trait]
pub trait HistoricalProvider: Send + Sync {
    /// Recorded in the chunk ledger for every chunk this provider fills.
    fn source_name(&self) -> &str;

    /// Bars with `req.start <= ts < req.end`. An empty vector means the
    /// provider has no data for the window.
    async fn fetch_bars(&self, req: &FetchRequest) -> Result<Vec<Bar>>;
}
