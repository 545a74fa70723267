//! stx-cache
//!
//! Persistent OHLCV cache with a chunk ledger.
//!
//! Every (symbol, bar size) pair owns a bars table and a chunk ledger in a
//! single SQLite file. The ledger records, per chunk start, which data source
//! last supplied that chunk. Callers ask [`MarketDataCache::get_missing_range`]
//! which sub-range still has to be fetched, fetch only that, and feed it back
//! through [`MarketDataCache::add_data`].
//!
//! Chunks still in progress (their end is after "now") are never recorded, so
//! today's session is always re-fetched.

pub mod chunk;
mod error;
pub mod table;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use stx_calendar::{BarSize, SessionDefinition};
use tracing::{debug, info};

pub use chunk::{chunk_end, chunks_for_range, ChunkGranularity};
pub use error::CacheError;
pub use table::{normalize_symbol, TableNames};

/// Overrides the configured cache file location.
pub const ENV_CACHE_PATH: &str = "STX_CACHE_PATH";

/// Rows per upsert statement (and per transaction).
pub const DEFAULT_BATCH_SIZE: usize = 2_000;

/// One OHLCV bar. `ts` is the bar start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub ts: DateTime<Tz>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chunk-aligned span that still has to be fetched: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingRange {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedChunk {
    pub start: DateTime<Tz>,
    pub data_source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub rows_upserted: usize,
    pub batches: usize,
    pub chunks_marked: usize,
    /// Chunks touched by the bars but not recorded because they are not over yet.
    pub chunks_in_progress: usize,
}

// ---------------------------------------------------------------------------
// MarketDataCache
// ---------------------------------------------------------------------------

/// Cloneable handle over one SQLite pool.
#[derive(Debug, Clone)]
pub struct MarketDataCache {
    pool: SqlitePool,
    session: Arc<SessionDefinition>,
    display_tz: Tz,
    batch_size: usize,
}

impl MarketDataCache {
    /// Open (creating if needed) the cache database at `path`.
    pub async fn open(
        path: impl AsRef<Path>,
        session: Arc<SessionDefinition>,
        display_tz: Tz,
    ) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create cache directory {}", parent.display())
                })?;
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to open cache database {}", path.display()))?;

        info!(path = %path.display(), "market data cache opened");
        Ok(Self::from_pool(pool, session, display_tz))
    }

    pub fn from_pool(pool: SqlitePool, session: Arc<SessionDefinition>, display_tz: Tz) -> Self {
        Self {
            pool,
            session,
            display_tz,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn session(&self) -> &Arc<SessionDefinition> {
        &self.session
    }

    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Upsert `bars` and record every completed chunk they span as supplied
    /// by `data_source`.
    pub async fn add_data(
        &self,
        symbol: &str,
        bar_size: BarSize,
        bars: &[Bar],
        data_source: &str,
    ) -> Result<AddReport> {
        self.add_data_as_of(symbol, bar_size, bars, data_source, Utc::now())
            .await
    }

    /// [`add_data`](Self::add_data) with an explicit "now" for the
    /// in-progress chunk rule.
    pub async fn add_data_as_of(
        &self,
        symbol: &str,
        bar_size: BarSize,
        bars: &[Bar],
        data_source: &str,
        now: DateTime<Utc>,
    ) -> Result<AddReport> {
        let started = Instant::now();
        let tables = TableNames::new(symbol, bar_size)?;
        let mut report = AddReport::default();

        let Some(first) = bars.first() else {
            debug!(table = %tables.bars, "add_data called with no bars");
            return Ok(report);
        };

        self.ensure_bars_table(&tables).await?;

        for batch in bars.chunks(self.batch_size) {
            let mut tx = self
                .pool
                .begin()
                .await
                .context("begin bar upsert transaction failed")?;

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "insert into {} (date, open, high, low, close, volume) ",
                tables.quoted_bars()
            ));
            qb.push_values(batch, |mut row, bar| {
                row.push_bind(bar.ts.timestamp())
                    .push_bind(bar.open)
                    .push_bind(bar.high)
                    .push_bind(bar.low)
                    .push_bind(bar.close)
                    .push_bind(bar.volume);
            });
            qb.push(
                r#"
                on conflict (date) do update set
                  open = excluded.open,
                  high = excluded.high,
                  low = excluded.low,
                  close = excluded.close,
                  volume = excluded.volume
                "#,
            );
            qb.build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("upsert into {} failed", tables.bars))?;

            tx.commit()
                .await
                .with_context(|| format!("commit upsert into {} failed", tables.bars))?;

            report.rows_upserted += batch.len();
            report.batches += 1;
        }

        let (lo, hi) = bars.iter().fold((first.ts, first.ts), |(lo, hi), b| {
            (lo.min(b.ts), hi.max(b.ts))
        });
        let granularity = ChunkGranularity::for_bar_size(bar_size);
        let (completed, in_progress): (Vec<_>, Vec<_>) =
            chunks_for_range(&self.session, bar_size, lo, hi)
                .into_iter()
                .partition(|c| chunk_end(&self.session, granularity, *c) <= now);

        report.chunks_in_progress = in_progress.len();
        if !completed.is_empty() {
            self.mark_chunks(&tables, &completed, data_source).await?;
            report.chunks_marked = completed.len();
        }

        debug!(
            table = %tables.bars,
            rows = report.rows_upserted,
            batches = report.batches,
            chunks_marked = report.chunks_marked,
            chunks_in_progress = report.chunks_in_progress,
            source = data_source,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "add_data"
        );
        Ok(report)
    }

    async fn mark_chunks(
        &self,
        tables: &TableNames,
        chunk_starts: &[DateTime<Tz>],
        data_source: &str,
    ) -> Result<()> {
        self.ensure_chunks_table(tables).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin chunk ledger transaction failed")?;
        for batch in chunk_starts.chunks(self.batch_size) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "insert into {} (date, data_source) ",
                tables.quoted_chunks()
            ));
            qb.push_values(batch, |mut row, start| {
                row.push_bind(start.timestamp()).push_bind(data_source);
            });
            qb.push(" on conflict (date) do update set data_source = excluded.data_source");
            qb.build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("upsert into {} failed", tables.chunks))?;
        }
        tx.commit()
            .await
            .with_context(|| format!("commit upsert into {} failed", tables.chunks))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Stored bars with `start <= ts <= end`, ascending, in the display zone.
    /// Unknown (symbol, bar size) pairs yield an empty vector.
    pub async fn get_data(
        &self,
        symbol: &str,
        bar_size: BarSize,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<Bar>> {
        ensure_range(start, end)?;
        let started = Instant::now();
        let tables = TableNames::new(symbol, bar_size)?;
        if !self.table_exists(&tables.bars).await? {
            return Ok(Vec::new());
        }

        let sql = format!(
            "select date, open, high, low, close, volume from {} where date between ? and ? order by date",
            tables.quoted_bars()
        );
        let rows: Vec<(i64, f64, f64, f64, f64, f64)> = sqlx::query_as(&sql)
            .bind(ceil_epoch_secs(start))
            .bind(end.timestamp())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select from {} failed", tables.bars))?;

        let bars = rows
            .into_iter()
            .map(|(date, open, high, low, close, volume)| {
                Ok(Bar {
                    ts: self.from_epoch(date, &tables.bars)?,
                    open,
                    high,
                    low,
                    close,
                    volume,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            table = %tables.bars,
            rows = bars.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "get_data"
        );
        Ok(bars)
    }

    /// The chunk-aligned span of `[start, end]` that is not cached yet.
    ///
    /// Returns `None` when every chunk in the range is recorded (or the range
    /// holds no chunk at all). Otherwise the span runs from the earliest
    /// missing chunk start to the end of the latest missing chunk; cached
    /// chunks in between are included in the span.
    pub async fn get_missing_range(
        &self,
        symbol: &str,
        bar_size: BarSize,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Option<MissingRange>> {
        ensure_range(start, end)?;
        let tables = TableNames::new(symbol, bar_size)?;
        let granularity = ChunkGranularity::for_bar_size(bar_size);
        let wanted = chunks_for_range(&self.session, bar_size, start, end);

        let (Some(first), Some(last)) = (wanted.first(), wanted.last()) else {
            return Ok(None);
        };

        if !self.table_exists(&tables.chunks).await? {
            return Ok(Some(self.missing_span(*first, *last, granularity)));
        }

        let sql = format!(
            "select date from {} where date between ? and ?",
            tables.quoted_chunks()
        );
        let cached: HashSet<i64> = sqlx::query_scalar::<_, i64>(&sql)
            .bind(first.timestamp())
            .bind(last.timestamp())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select from {} failed", tables.chunks))?
            .into_iter()
            .collect();

        let mut missing = wanted.iter().filter(|c| !cached.contains(&c.timestamp()));
        let Some(lo) = missing.next() else {
            debug!(table = %tables.chunks, chunks = wanted.len(), "range fully cached");
            return Ok(None);
        };
        let hi = missing.last().unwrap_or(lo);

        let span = self.missing_span(*lo, *hi, granularity);
        debug!(
            table = %tables.chunks,
            start = %span.start,
            end = %span.end,
            "missing range"
        );
        Ok(Some(span))
    }

    /// The whole chunk ledger for (symbol, bar size), ascending.
    pub async fn cached_chunks(&self, symbol: &str, bar_size: BarSize) -> Result<Vec<CachedChunk>> {
        let tables = TableNames::new(symbol, bar_size)?;
        if !self.table_exists(&tables.chunks).await? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "select date, data_source from {} order by date",
            tables.quoted_chunks()
        );
        let rows: Vec<(i64, Option<String>)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select from {} failed", tables.chunks))?;

        rows.into_iter()
            .map(|(date, data_source)| {
                Ok(CachedChunk {
                    start: self
                        .from_epoch(date, &tables.chunks)?
                        .with_timezone(&self.session.tz()),
                    data_source,
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Schema helpers
    // -----------------------------------------------------------------------

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
            r#"
            select count(*)
            from sqlite_master
            where type = 'table' and name = ? collate nocase
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("table-exists query failed for {name}"))?;
        Ok(n > 0)
    }

    async fn ensure_bars_table(&self, tables: &TableNames) -> Result<()> {
        let sql = format!(
            r#"
            create table if not exists {} (
              date   integer not null unique,
              open   real,
              high   real,
              low    real,
              close  real,
              volume real
            )
            "#,
            tables.quoted_bars()
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("create table {} failed", tables.bars))?;
        Ok(())
    }

    async fn ensure_chunks_table(&self, tables: &TableNames) -> Result<()> {
        let sql = format!(
            r#"
            create table if not exists {} (
              date        integer not null unique,
              data_source text
            )
            "#,
            tables.quoted_chunks()
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("create table {} failed", tables.chunks))?;
        Ok(())
    }

    fn from_epoch(&self, secs: i64, table: &str) -> Result<DateTime<Tz>> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .map(|t| t.with_timezone(&self.display_tz))
            .ok_or_else(|| anyhow!("corrupt timestamp {secs} in {table}"))
    }

    fn missing_span(
        &self,
        lo: DateTime<Tz>,
        hi: DateTime<Tz>,
        granularity: ChunkGranularity,
    ) -> MissingRange {
        MissingRange {
            start: lo.with_timezone(&self.display_tz),
            end: chunk_end(&self.session, granularity, hi).with_timezone(&self.display_tz),
        }
    }
}

/// Rows are keyed by whole seconds, so a fractional lower bound rounds up.
fn ceil_epoch_secs(t: DateTime<Tz>) -> i64 {
    if t.timestamp_subsec_nanos() > 0 {
        t.timestamp() + 1
    } else {
        t.timestamp()
    }
}

fn ensure_range(start: DateTime<Tz>, end: DateTime<Tz>) -> Result<()> {
    if start > end {
        return Err(CacheError::InvalidRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        }
        .into());
    }
    Ok(())
}
