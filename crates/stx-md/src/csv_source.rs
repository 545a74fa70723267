//! CSV bar source.
//!
//! ## Column contract (case-insensitive, order-independent)
//!
//! | Column   | Example                     | Notes                                   |
//! |----------|-----------------------------|-----------------------------------------|
//! | `date`   | `2024-03-05T09:30:00-05:00` | RFC 3339, `YYYY-MM-DD[ HH:MM[:SS]]` in the file zone, or epoch seconds. Aliases: `datetime`, `timestamp`, `time` |
//! | `open`   | `182.34`                    |                                         |
//! | `high`   | `185.00`                    |                                         |
//! | `low`    | `181.00`                    |                                         |
//! | `close`  | `184.50`                    |                                         |
//! | `volume` | `1000000`                   |                                         |
//! | `symbol` | `AAPL`                      | Optional; when present rows are filtered by symbol |
//!
//! Rows whose timestamp or numbers do not parse, or whose low is above their
//! high, are skipped and counted in [`CsvBars::rows_rejected`]. Only
//! structural errors (IO, missing header) are returned as `Err`.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono_tz::Tz;
use stx_cache::Bar;
use stx_calendar::parse_timestamp;
use tracing::{debug, warn};

use crate::provider::{FetchRequest, HistoricalProvider, ProviderError};

const DATE_COLUMNS: [&str; 4] = ["date", "datetime", "timestamp", "time"];
const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvIngestError {
    /// An I/O or CSV-library error.
    Io(String),
    /// The header row is missing a required column.
    MissingHeader(String),
}

impl fmt::Display for CsvIngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvIngestError::Io(msg) => write!(f, "csv io error: {msg}"),
            CsvIngestError::MissingHeader(col) => {
                write!(f, "csv missing required header column: '{col}'")
            }
        }
    }
}

impl std::error::Error for CsvIngestError {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvBars {
    /// Accepted bars, ascending by timestamp.
    pub bars: Vec<Bar>,
    pub rows_rejected: usize,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse bars from any reader. Naive timestamps are read in `tz`.
pub fn parse_bars_csv<R: Read>(
    src: R,
    tz: Tz,
    symbol: Option<&str>,
) -> Result<CsvBars, CsvIngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(src);

    let headers = rdr
        .headers()
        .map_err(|e| CsvIngestError::Io(e.to_string()))?
        .clone();
    if headers.is_empty() {
        return Ok(CsvBars::default());
    }

    let idx: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_ascii_lowercase(), i))
        .collect();

    let date_col = DATE_COLUMNS
        .iter()
        .find_map(|c| idx.get(*c).copied())
        .ok_or_else(|| CsvIngestError::MissingHeader("date".to_string()))?;
    let mut price_cols = [0usize; 5];
    for (slot, name) in price_cols.iter_mut().zip(PRICE_COLUMNS) {
        *slot = *idx
            .get(name)
            .ok_or_else(|| CsvIngestError::MissingHeader(name.to_string()))?;
    }
    let symbol_col = idx.get("symbol").copied();

    let mut out = CsvBars::default();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| CsvIngestError::Io(e.to_string()))?;

        if let (Some(col), Some(want)) = (symbol_col, symbol) {
            if !rec.get(col).unwrap_or("").eq_ignore_ascii_case(want) {
                continue;
            }
        }

        let Ok(ts) = parse_timestamp(rec.get(date_col).unwrap_or(""), tz) else {
            out.rows_rejected += 1;
            continue;
        };

        let mut values = [0f64; 5];
        let mut ok = true;
        for (v, col) in values.iter_mut().zip(price_cols) {
            match rec.get(col).unwrap_or("").parse::<f64>() {
                Ok(x) if x.is_finite() => *v = x,
                _ => ok = false,
            }
        }
        let [open, high, low, close, volume] = values;
        if !ok || low > high {
            out.rows_rejected += 1;
            continue;
        }

        out.bars.push(Bar {
            ts,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    out.bars.sort_by_key(|b| b.ts);
    Ok(out)
}

pub fn parse_bars_csv_str(
    src: &str,
    tz: Tz,
    symbol: Option<&str>,
) -> Result<CsvBars, CsvIngestError> {
    parse_bars_csv(src.as_bytes(), tz, symbol)
}

pub fn read_bars_csv(path: &Path, tz: Tz, symbol: Option<&str>) -> Result<CsvBars, CsvIngestError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CsvIngestError::Io(format!("open '{}': {e}", path.display())))?;
    parse_bars_csv(file, tz, symbol)
}

// ---------------------------------------------------------------------------
// CsvProvider
// ---------------------------------------------------------------------------

/// Serves fetches from a local CSV file.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    path: PathBuf,
    tz: Tz,
    source_name: String,
}

impl CsvProvider {
    /// `tz` is the zone used for naive timestamps in the file.
    pub fn new(path: impl Into<PathBuf>, tz: Tz) -> Self {
        Self {
            path: path.into(),
            tz,
            source_name: "csv".to_string(),
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }
}

#[async_trait::async_trait]
impl HistoricalProvider for CsvProvider {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn fetch_bars(&self, req: &FetchRequest) -> Result<Vec<Bar>> {
        if !self.path.exists() {
            return Err(ProviderError::Transport(format!(
                "csv source not found: {}",
                self.path.display()
            ))
            .into());
        }
        let parsed = read_bars_csv(&self.path, self.tz, Some(&req.symbol))
            .map_err(|e| match e {
                CsvIngestError::Io(msg) => ProviderError::Transport(msg),
                CsvIngestError::MissingHeader(col) => {
                    ProviderError::Decode(format!("missing header column '{col}'"))
                }
            })
            .with_context(|| format!("read csv source {}", self.path.display()))?;
        if parsed.rows_rejected > 0 {
            warn!(
                path = %self.path.display(),
                rejected = parsed.rows_rejected,
                "csv rows rejected"
            );
        }

        let bars: Vec<Bar> = parsed
            .bars
            .into_iter()
            .filter(|b| req.contains(&b.ts))
            .collect();
        debug!(
            symbol = %req.symbol,
            bar_size = %req.bar_size,
            rows = bars.len(),
            "csv fetch"
        );
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const NY: Tz = chrono_tz::US::Eastern;

    #[test]
    fn empty_input_returns_no_bars() {
        assert_eq!(parse_bars_csv_str("", NY, None).unwrap(), CsvBars::default());
    }

    #[test]
    fn missing_required_header_returns_err() {
        let err = parse_bars_csv_str("date,open,high,low,close\n", NY, None).unwrap_err();
        assert_eq!(err, CsvIngestError::MissingHeader("volume".to_string()));
    }

    #[test]
    fn mixed_timestamp_shapes_and_header_case() {
        let src = "\
Date,Open,High,Low,Close,Volume
2024-03-05 09:31,10,12,9,11,100
1709649000,10,12,9,11,100
2024-03-05T14:32:00Z,10,12,9,11,100
";
        let parsed = parse_bars_csv_str(src, NY, None).unwrap();
        assert_eq!(parsed.rows_rejected, 0);
        let times: Vec<_> = parsed.bars.iter().map(|b| b.ts).collect();
        assert_eq!(
            times,
            vec![
                NY.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap(),
                NY.with_ymd_and_hms(2024, 3, 5, 9, 31, 0).unwrap(),
                NY.with_ymd_and_hms(2024, 3, 5, 9, 32, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn bad_rows_are_counted_not_fatal() {
        let src = "\
date,open,high,low,close,volume
2024-03-05 09:30,10,12,9,11,100
not-a-date,10,12,9,11,100
2024-03-05 09:31,10,abc,9,11,100
2024-03-05 09:32,10,8,9,11,100
";
        let parsed = parse_bars_csv_str(src, NY, None).unwrap();
        assert_eq!(parsed.bars.len(), 1);
        assert_eq!(parsed.rows_rejected, 3);
    }

    #[test]
    fn symbol_column_filters_rows() {
        let src = "\
symbol,date,open,high,low,close,volume
SPY,2024-03-05,1,1,1,1,1
QQQ,2024-03-05,2,2,2,2,2
spy,2024-03-06,3,3,3,3,3
";
        let parsed = parse_bars_csv_str(src, NY, Some("SPY")).unwrap();
        let closes: Vec<f64> = parsed.bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 3.0]);
    }
}
