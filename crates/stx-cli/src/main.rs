use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::AppContext;

#[derive(Parser)]
#[command(name = "stx")]
#[command(about = "StonX trading-calendar and market-data cache CLI", long_about = None)]
struct Cli {
    /// Config layers in merge order (later overrides earlier). Defaults to
    /// $STX_CONFIG or the app data config.json.
    #[arg(long = "config", global = true)]
    config_paths: Vec<PathBuf>,

    /// Fail when the config contains keys nothing reads.
    #[arg(long, global = true, default_value_t = false)]
    strict_config: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the layered config hash + canonical JSON
    ConfigHash,

    /// Bar-grid arithmetic
    Offset {
        #[command(subcommand)]
        cmd: OffsetCmd,
    },

    /// Pre-market and post-market windows between two instants
    Sessions {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },

    /// Session boundaries of one date, re-expressed in a display timezone
    MarketHours {
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,

        /// IANA zone (defaults to display_timezone)
        #[arg(long)]
        tz: Option<String>,
    },

    /// Market data cache utilities
    Cache {
        /// Cache database path (defaults to cache.path / $STX_CACHE_PATH)
        #[arg(long = "cache-path", global = true)]
        cache_path: Option<PathBuf>,

        #[command(subcommand)]
        cmd: CacheCmd,
    },

    /// Cache-first historical request; missing data is read from a CSV file.
    Request {
        #[arg(long)]
        symbol: String,

        /// Defaults to chart.default_bar_size
        #[arg(long = "bar-size")]
        bar_size: Option<String>,

        /// Defaults to the lookback before --end
        #[arg(long)]
        start: Option<String>,

        /// Defaults to the latest bar start at or before now
        #[arg(long)]
        end: Option<String>,

        /// CSV file standing in for the data provider
        #[arg(long = "csv-source")]
        csv_source: PathBuf,

        /// Data source name recorded in the chunk ledger
        #[arg(long = "source-name", default_value = "csv")]
        source_name: String,

        /// extended | regular
        #[arg(long)]
        bounds: Option<String>,

        #[arg(long = "lookback-bars")]
        lookback_bars: Option<u32>,

        #[arg(long = "cache-path")]
        cache_path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum OffsetCmd {
    /// Floor a timestamp onto the bar grid (plus rollback/rollforward)
    Round {
        /// Defaults to chart.default_bar_size
        #[arg(long = "bar-size")]
        bar_size: Option<String>,

        #[arg(long)]
        at: String,

        #[arg(long)]
        bounds: Option<String>,
    },

    /// Move n bars from a timestamp (negative = backward, 0 = round)
    Step {
        /// Defaults to chart.default_bar_size
        #[arg(long = "bar-size")]
        bar_size: Option<String>,

        #[arg(long)]
        at: String,

        #[arg(long, allow_hyphen_values = true)]
        n: i64,

        #[arg(long)]
        bounds: Option<String>,
    },

    /// Trading-time coordinate of a timestamp
    Coord {
        /// Defaults to chart.default_bar_size
        #[arg(long = "bar-size")]
        bar_size: Option<String>,

        #[arg(long)]
        at: String,

        #[arg(long)]
        bounds: Option<String>,
    },

    /// Timestamp (display timezone) of a trading-time coordinate
    FromCoord {
        /// Defaults to chart.default_bar_size
        #[arg(long = "bar-size")]
        bar_size: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        coord: f64,

        #[arg(long)]
        bounds: Option<String>,
    },
}

#[derive(Subcommand)]
enum CacheCmd {
    /// Print the chunk-aligned span that still needs fetching
    Missing {
        #[arg(long)]
        symbol: String,

        #[arg(long = "bar-size")]
        bar_size: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },

    /// Print cached bars (JSON lines) in the inclusive range
    Get {
        #[arg(long)]
        symbol: String,

        #[arg(long = "bar-size")]
        bar_size: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },

    /// List ledger entries (chunk start + data source)
    Chunks {
        #[arg(long)]
        symbol: String,

        #[arg(long = "bar-size")]
        bar_size: String,
    },

    /// Upsert bars from a CSV file
    IngestCsv {
        #[arg(long)]
        symbol: String,

        #[arg(long = "bar-size")]
        bar_size: String,

        #[arg(long)]
        file: PathBuf,

        /// Data source name recorded in the chunk ledger
        #[arg(long, default_value = "csv")]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    let ctx = AppContext::load(&cli.config_paths, cli.strict_config)?;

    match cli.cmd {
        Commands::ConfigHash => {
            println!("config_hash={}", ctx.loaded.config_hash);
            println!("{}", ctx.loaded.canonical_json);
        }

        Commands::Offset { cmd } => match cmd {
            OffsetCmd::Round {
                bar_size,
                at,
                bounds,
            } => commands::offset::round(&ctx, bar_size.as_deref(), &at, bounds.as_deref())?,
            OffsetCmd::Step {
                bar_size,
                at,
                n,
                bounds,
            } => commands::offset::step(&ctx, bar_size.as_deref(), &at, n, bounds.as_deref())?,
            OffsetCmd::Coord {
                bar_size,
                at,
                bounds,
            } => commands::offset::coord(&ctx, bar_size.as_deref(), &at, bounds.as_deref())?,
            OffsetCmd::FromCoord {
                bar_size,
                coord,
                bounds,
            } => commands::offset::from_coord(&ctx, bar_size.as_deref(), coord, bounds.as_deref())?,
        },

        Commands::Sessions { start, end } => commands::offset::sessions(&ctx, &start, &end)?,

        Commands::MarketHours { date, tz } => {
            commands::offset::market_hours(&ctx, &date, tz.as_deref())?
        }

        Commands::Cache { cache_path, cmd } => {
            let cache_path = cache_path.as_deref();
            match cmd {
                CacheCmd::Missing {
                    symbol,
                    bar_size,
                    start,
                    end,
                } => {
                    commands::cache::missing(&ctx, cache_path, &symbol, &bar_size, &start, &end)
                        .await?
                }
                CacheCmd::Get {
                    symbol,
                    bar_size,
                    start,
                    end,
                } => commands::cache::get(&ctx, cache_path, &symbol, &bar_size, &start, &end).await?,
                CacheCmd::Chunks { symbol, bar_size } => {
                    commands::cache::chunks(&ctx, cache_path, &symbol, &bar_size).await?
                }
                CacheCmd::IngestCsv {
                    symbol,
                    bar_size,
                    file,
                    source,
                } => {
                    commands::cache::ingest_csv(&ctx, cache_path, &symbol, &bar_size, &file, &source)
                        .await?
                }
            }
        }

        Commands::Request {
            symbol,
            bar_size,
            start,
            end,
            csv_source,
            source_name,
            bounds,
            lookback_bars,
            cache_path,
        } => {
            commands::request::run(
                &ctx,
                commands::request::RequestArgs {
                    cache_path: cache_path.as_deref(),
                    symbol: &symbol,
                    bar_size: bar_size.as_deref(),
                    start: start.as_deref(),
                    end: end.as_deref(),
                    csv_source: &csv_source,
                    source_name: &source_name,
                    bounds: bounds.as_deref(),
                    lookback_bars,
                },
            )
            .await?
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
