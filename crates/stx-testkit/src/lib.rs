//! stx-testkit
//!
//! Fixtures shared by the end-to-end scenarios under `tests/`: a cache in a
//! temporary directory, deterministic bar generators, and a scripted
//! provider that records every fetch it serves.

mod mock_provider;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use stx_cache::{Bar, MarketDataCache};
use stx_calendar::{SessionDefinition, TradingOffset};
use tempfile::TempDir;

pub use mock_provider::MockProvider;

/// 04:00-20:00 US/Eastern on the NYSE calendar.
pub fn us_session() -> Arc<SessionDefinition> {
    Arc::new(SessionDefinition::us_equities())
}

/// A cache file that lives as long as this value.
pub struct TempCache {
    pub dir: TempDir,
    pub cache: MarketDataCache,
}

pub async fn temp_cache(display_tz: Tz) -> Result<TempCache> {
    let dir = TempDir::new().context("create temp dir for cache")?;
    let cache = MarketDataCache::open(dir.path().join("cache.sqlite"), us_session(), display_tz)
        .await?;
    Ok(TempCache { dir, cache })
}

/// Deterministic bar at `ts`; prices derive from `close`.
pub fn bar_at(ts: DateTime<Tz>, close: f64) -> Bar {
    Bar {
        ts,
        open: close - 0.25,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 100.0,
    }
}

/// Every bar of `offset`'s grid on `date`, first bar through last bar.
/// Empty on non-business days.
pub fn session_bars(offset: &TradingOffset, date: NaiveDate) -> Vec<Bar> {
    let session = offset.session();
    if !session.calendar().is_business_day(date) {
        return Vec::new();
    }
    let (first, _) = offset.daily_bar_range();
    let mut t = session.localize(date.and_time(first));
    let mut out = Vec::new();
    while session.local(&t).date() == date {
        out.push(bar_at(t, 100.0 + out.len() as f64 * 0.01));
        t = offset.step_forward(t);
    }
    out
}

/// One bar at session-local midnight for every business day in `[from, to]`.
pub fn daily_bars(session: &SessionDefinition, from: NaiveDate, to: NaiveDate) -> Vec<Bar> {
    session
        .calendar()
        .business_days_in_range(from, to)
        .into_iter()
        .enumerate()
        .map(|(i, d)| bar_at(session.midnight(d), 380.0 + i as f64))
        .collect()
}
