//! Chunk boundaries for the cache ledger.
//!
//! Intraday bar sizes are tracked one business day at a time (chunk start =
//! local midnight of the business day, session zone). Daily and longer sizes
//! are tracked one calendar year at a time (chunk start = local Jan 1).

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use stx_calendar::{BarSize, SessionDefinition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkGranularity {
    TradingDay,
    Year,
}

impl ChunkGranularity {
    pub fn for_bar_size(bar_size: BarSize) -> Self {
        if bar_size.is_intraday() {
            ChunkGranularity::TradingDay
        } else {
            ChunkGranularity::Year
        }
    }
}

/// Chunk starts covering `[start, end]`, ascending.
///
/// Both ends are first converted to session-local dates. Empty when
/// `start > end` or when an intraday range holds no business day.
pub fn chunks_for_range(
    session: &SessionDefinition,
    bar_size: BarSize,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
) -> Vec<DateTime<Tz>> {
    let first = session.local(&start).date();
    let last = session.local(&end).date();

    match ChunkGranularity::for_bar_size(bar_size) {
        ChunkGranularity::TradingDay => session
            .calendar()
            .business_days_in_range(first, last)
            .into_iter()
            .map(|d| session.midnight(d))
            .collect(),
        ChunkGranularity::Year => (first.year()..=last.year())
            .filter_map(|y| NaiveDate::from_ymd_opt(y, 1, 1))
            .map(|d| session.midnight(d))
            .collect(),
    }
}

/// Exclusive end of the chunk starting at `chunk_start`.
pub fn chunk_end(
    session: &SessionDefinition,
    granularity: ChunkGranularity,
    chunk_start: DateTime<Tz>,
) -> DateTime<Tz> {
    let date = session.local(&chunk_start).date();
    let next = match granularity {
        ChunkGranularity::TradingDay => date.succ_opt(),
        ChunkGranularity::Year => NaiveDate::from_ymd_opt(date.year() + 1, 1, 1),
    };
    session.midnight(next.unwrap_or(date))
}
