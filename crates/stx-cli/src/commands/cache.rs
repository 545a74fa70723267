//! `stx cache ...`

use std::path::Path;

use anyhow::{Context, Result};
use stx_md::read_bars_csv;
use tracing::warn;

use super::{parse_bar_size, print_json_line, AppContext};

pub async fn missing(
    ctx: &AppContext,
    cache_path: Option<&Path>,
    symbol: &str,
    bar_size: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    let bar_size = parse_bar_size(bar_size)?;
    let (start, end) = (ctx.parse_at(start)?, ctx.parse_at(end)?);
    let cache = ctx.open_cache(cache_path).await?;

    match cache.get_missing_range(symbol, bar_size, start, end).await? {
        Some(range) => {
            println!("missing=true");
            println!("start={}", range.start.to_rfc3339());
            println!("end={}", range.end.to_rfc3339());
        }
        None => println!("missing=false"),
    }
    Ok(())
}

pub async fn get(
    ctx: &AppContext,
    cache_path: Option<&Path>,
    symbol: &str,
    bar_size: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    let bar_size = parse_bar_size(bar_size)?;
    let (start, end) = (ctx.parse_at(start)?, ctx.parse_at(end)?);
    let cache = ctx.open_cache(cache_path).await?;

    let bars = cache.get_data(symbol, bar_size, start, end).await?;
    for bar in &bars {
        print_json_line(bar)?;
    }
    eprintln!("rows={}", bars.len());
    Ok(())
}

pub async fn chunks(
    ctx: &AppContext,
    cache_path: Option<&Path>,
    symbol: &str,
    bar_size: &str,
) -> Result<()> {
    let bar_size = parse_bar_size(bar_size)?;
    let cache = ctx.open_cache(cache_path).await?;

    let chunks = cache.cached_chunks(symbol, bar_size).await?;
    for c in &chunks {
        println!(
            "{} {}",
            c.start.to_rfc3339(),
            c.data_source.as_deref().unwrap_or("-")
        );
    }
    println!("chunks={}", chunks.len());
    Ok(())
}

/// Load bars from a CSV file straight into the cache under `source`.
pub async fn ingest_csv(
    ctx: &AppContext,
    cache_path: Option<&Path>,
    symbol: &str,
    bar_size: &str,
    file: &Path,
    source: &str,
) -> Result<()> {
    let bar_size = parse_bar_size(bar_size)?;
    let parsed = read_bars_csv(file, ctx.session.tz(), Some(symbol))
        .with_context(|| format!("read bars csv {}", file.display()))?;
    if parsed.rows_rejected > 0 {
        warn!(
            file = %file.display(),
            rows_rejected = parsed.rows_rejected,
            "csv rows rejected"
        );
    }

    let cache = ctx.open_cache(cache_path).await?;
    let report = cache.add_data(symbol, bar_size, &parsed.bars, source).await?;

    println!("rows_upserted={}", report.rows_upserted);
    println!("batches={}", report.batches);
    println!("chunks_marked={}", report.chunks_marked);
    println!("chunks_in_progress={}", report.chunks_in_progress);
    Ok(())
}
