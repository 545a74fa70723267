//! stx-md
//!
//! Historical market-data requests.
//!
//! This crate owns the provider abstraction, the CSV provider, and the
//! cache-first request orchestrator. Persistence belongs to `stx-cache`.

pub mod csv_source;
pub mod provider;
pub mod service;

pub use csv_source::{parse_bars_csv, parse_bars_csv_str, read_bars_csv, CsvBars, CsvIngestError, CsvProvider};
pub use provider::{FetchRequest, HistoricalProvider, ProviderError};
pub use service::{HistoricalBars, MarketDataService, DEFAULT_LOOKBACK_BARS};
