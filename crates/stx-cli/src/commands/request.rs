//! `stx request`: cache-first historical request backed by a CSV source.

use std::path::Path;

use anyhow::Result;
use stx_md::{CsvProvider, MarketDataService};

use super::offset::parse_bounds;
use super::{print_json_line, AppContext};

pub struct RequestArgs<'a> {
    pub cache_path: Option<&'a Path>,
    pub symbol: &'a str,
    pub bar_size: Option<&'a str>,
    pub start: Option<&'a str>,
    pub end: Option<&'a str>,
    pub csv_source: &'a Path,
    pub source_name: &'a str,
    pub bounds: Option<&'a str>,
    pub lookback_bars: Option<u32>,
}

pub async fn run(ctx: &AppContext, args: RequestArgs<'_>) -> Result<()> {
    let bar_size = ctx.bar_size_or_default(args.bar_size)?;
    let start = args.start.map(|s| ctx.parse_at(s)).transpose()?;
    let end = args.end.map(|s| ctx.parse_at(s)).transpose()?;
    let bounds = match args.bounds {
        Some(b) => parse_bounds(b)?,
        None => ctx.settings.session.bounds,
    };

    let provider =
        CsvProvider::new(args.csv_source, ctx.session.tz()).with_source_name(args.source_name);
    let cache = ctx.open_cache(args.cache_path).await?;
    let mut service = MarketDataService::new(cache, provider).with_bounds(bounds);
    if let Some(n) = args.lookback_bars {
        service = service.with_lookback_bars(n);
    }

    let out = service
        .request_historical_bars(args.symbol, bar_size, start, end)
        .await?;

    for bar in &out.bars {
        print_json_line(bar)?;
    }
    eprintln!("symbol={} bar_size={}", out.symbol, out.bar_size);
    eprintln!("start={} end={}", out.start.to_rfc3339(), out.end.to_rfc3339());
    match out.fetched {
        Some(range) => eprintln!(
            "fetched={}..{} fetched_rows={}",
            range.start.to_rfc3339(),
            range.end.to_rfc3339(),
            out.fetched_rows
        ),
        None => eprintln!("fetched=none"),
    }
    eprintln!("rows={}", out.bars.len());
    Ok(())
}
