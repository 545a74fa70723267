//! `stx offset ...`, `stx sessions` and `stx market-hours`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use stx_calendar::{parse_timezone, PrePostMarketOffset, SessionBounds, TradingOffset};
use tracing::info;

use super::AppContext;

pub fn parse_bounds(raw: &str) -> Result<SessionBounds> {
    match raw.trim().to_lowercase().as_str() {
        "extended" => Ok(SessionBounds::Extended),
        "regular" => Ok(SessionBounds::Regular),
        other => bail!("invalid --bounds '{other}'. expected one of: extended | regular"),
    }
}

fn build_offset(
    ctx: &AppContext,
    bar_size: Option<&str>,
    bounds: Option<&str>,
) -> Result<TradingOffset> {
    let bar_size = ctx.bar_size_or_default(bar_size)?;
    let bounds = match bounds {
        Some(b) => parse_bounds(b)?,
        None => ctx.settings.session.bounds,
    };
    TradingOffset::with_bounds(bar_size, ctx.session.clone(), bounds)
        .context("build trading offset")
}

pub fn round(ctx: &AppContext, bar_size: Option<&str>, at: &str, bounds: Option<&str>) -> Result<()> {
    let offset = build_offset(ctx, bar_size, bounds)?;
    let t = ctx.parse_at(at)?;
    println!("input={}", t.to_rfc3339());
    println!("round={}", offset.round(t).to_rfc3339());
    println!("rollback={}", offset.rollback(t).to_rfc3339());
    println!("rollforward={}", offset.rollforward(t).to_rfc3339());
    println!("on_offset={}", offset.is_on_offset(t));
    Ok(())
}

pub fn step(
    ctx: &AppContext,
    bar_size: Option<&str>,
    at: &str,
    n: i64,
    bounds: Option<&str>,
) -> Result<()> {
    let offset = build_offset(ctx, bar_size, bounds)?;
    let t = ctx.parse_at(at)?;
    println!("result={}", offset.apply(t, n).to_rfc3339());
    Ok(())
}

pub fn coord(ctx: &AppContext, bar_size: Option<&str>, at: &str, bounds: Option<&str>) -> Result<()> {
    let offset = build_offset(ctx, bar_size, bounds)?;
    let t = ctx.parse_at(at)?;
    println!("coord={}", offset.timestamp(t));
    Ok(())
}

pub fn from_coord(
    ctx: &AppContext,
    bar_size: Option<&str>,
    coord: f64,
    bounds: Option<&str>,
) -> Result<()> {
    let offset = build_offset(ctx, bar_size, bounds)?;
    let t = offset.from_timestamp(coord, ctx.display_tz)?;
    println!("ts={}", t.to_rfc3339());
    Ok(())
}

/// Pre- and post-market windows between two instants. With
/// `chart.pre_post_market_highlight` off there is nothing to highlight.
pub fn sessions(ctx: &AppContext, start: &str, end: &str) -> Result<()> {
    let offset = PrePostMarketOffset::new(ctx.session.clone());
    let start = ctx.parse_at(start)?;
    let end = ctx.parse_at(end)?;
    if !ctx.settings.chart.pre_post_market_highlight {
        info!("pre/post market highlighting disabled");
        println!("windows=0");
        return Ok(());
    }
    let windows = offset.extended_hours_windows(start, end)?;
    for w in &windows {
        println!(
            "{} {} {}",
            w.kind.as_str(),
            w.start.with_timezone(&ctx.display_tz).to_rfc3339(),
            w.end.with_timezone(&ctx.display_tz).to_rfc3339()
        );
    }
    println!("windows={}", windows.len());
    Ok(())
}

pub fn market_hours(ctx: &AppContext, date: &str, tz: Option<&str>) -> Result<()> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid --date '{date}' (expected YYYY-MM-DD)"))?;
    let tz = match tz {
        Some(name) => parse_timezone(name)?,
        None => ctx.display_tz,
    };
    let [pre, open, close, post] = ctx.session.market_hours_in(tz, date);
    println!("timezone={}", tz.name());
    println!("business_day={}", ctx.session.calendar().is_business_day(date));
    println!("pre_market_open={pre}");
    println!("market_open={open}");
    println!("market_close={close}");
    println!("post_market_close={post}");
    Ok(())
}
