//! Historical-bar request orchestrator.
//!
//! Cache first: ask the cache which chunk-aligned span is missing, fetch only
//! that span from the provider, store it under the provider's source name,
//! then serve the requested range from the cache.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use stx_cache::{normalize_symbol, Bar, MarketDataCache, MissingRange};
use stx_calendar::{BarSize, SessionBounds, TradingOffset};
use tracing::{debug, info};

use crate::provider::{FetchRequest, HistoricalProvider};

/// Bars requested when the caller gives no start.
pub const DEFAULT_LOOKBACK_BARS: u32 = 200;

#[derive(Debug, Clone)]
pub struct HistoricalBars {
    pub symbol: String,
    pub bar_size: BarSize,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    /// The span fetched from the provider, if anything was missing.
    pub fetched: Option<MissingRange>,
    pub fetched_rows: usize,
    pub bars: Vec<Bar>,
}

pub struct MarketDataService<P> {
    cache: MarketDataCache,
    provider: P,
    bounds: SessionBounds,
    lookback_bars: u32,
}

impl<P: HistoricalProvider> MarketDataService<P> {
    pub fn new(cache: MarketDataCache, provider: P) -> Self {
        Self {
            cache,
            provider,
            bounds: SessionBounds::Extended,
            lookback_bars: DEFAULT_LOOKBACK_BARS,
        }
    }

    pub fn with_bounds(mut self, bounds: SessionBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_lookback_bars(mut self, bars: u32) -> Self {
        self.lookback_bars = bars;
        self
    }

    pub fn cache(&self) -> &MarketDataCache {
        &self.cache
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn request_historical_bars(
        &self,
        symbol: &str,
        bar_size: BarSize,
        start: Option<DateTime<Tz>>,
        end: Option<DateTime<Tz>>,
    ) -> Result<HistoricalBars> {
        self.request_historical_bars_as_of(symbol, bar_size, start, end, Utc::now())
            .await
    }

    /// Default `end` is the latest bar start at or before `now`; default
    /// `start` is the configured lookback (200 bars) before `end`.
    pub async fn request_historical_bars_as_of(
        &self,
        symbol: &str,
        bar_size: BarSize,
        start: Option<DateTime<Tz>>,
        end: Option<DateTime<Tz>>,
        now: DateTime<Utc>,
    ) -> Result<HistoricalBars> {
        let symbol = normalize_symbol(symbol)?;
        let session = self.cache.session().clone();
        let offset = TradingOffset::with_bounds(bar_size, session.clone(), self.bounds)
            .context("build trading offset")?;

        let end = match end {
            Some(e) => e,
            None => offset.rollback(now.with_timezone(&session.tz())),
        };
        let start = match start {
            Some(s) => s,
            None => offset.apply(end, -i64::from(self.lookback_bars)),
        };

        let missing = self
            .cache
            .get_missing_range(&symbol, bar_size, start, end)
            .await?;

        let mut fetched_rows = 0;
        if let Some(range) = missing {
            let req = FetchRequest {
                symbol: symbol.clone(),
                bar_size,
                start: range.start,
                end: range.end,
            };
            info!(
                symbol = %symbol,
                bar_size = %bar_size,
                start = %range.start,
                end = %range.end,
                source = self.provider.source_name(),
                "fetching missing range"
            );
            let bars = self.provider.fetch_bars(&req).await.with_context(|| {
                format!(
                    "fetch {symbol} {bar_size} {}..{} from {}",
                    range.start,
                    range.end,
                    self.provider.source_name()
                )
            })?;
            fetched_rows = bars.len();
            self.cache
                .add_data_as_of(&symbol, bar_size, &bars, self.provider.source_name(), now)
                .await?;
        } else {
            debug!(symbol = %symbol, bar_size = %bar_size, "served from cache");
        }

        let bars = self.cache.get_data(&symbol, bar_size, start, end).await?;
        Ok(HistoricalBars {
            symbol,
            bar_size,
            start,
            end,
            fetched: missing,
            fetched_rows,
            bars,
        })
    }
}
