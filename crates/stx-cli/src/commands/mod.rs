//! Command handler modules for stx-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod cache;
pub mod offset;
pub mod request;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::DateTime;
use chrono_tz::Tz;
use stx_cache::MarketDataCache;
use stx_calendar::{parse_timestamp, BarSize, SessionDefinition};
use stx_config::{report_unused_keys, LoadedConfig, StonxConfig, UnusedKeyPolicy};
use tracing::info;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Everything a command needs from configuration.
pub struct AppContext {
    pub loaded: LoadedConfig,
    pub settings: StonxConfig,
    pub session: Arc<SessionDefinition>,
    pub display_tz: Tz,
}

impl AppContext {
    /// Load `paths` in merge order, or the default layers when none are given.
    pub fn load(paths: &[PathBuf], strict: bool) -> Result<Self> {
        let loaded = if paths.is_empty() {
            stx_config::load_default()?
        } else {
            stx_config::load_layered(paths)?
        };

        let policy = if strict {
            UnusedKeyPolicy::Fail
        } else {
            UnusedKeyPolicy::Warn
        };
        report_unused_keys(&loaded.config_json, policy)?;

        let settings = loaded.settings();
        let session = Arc::new(settings.session_definition()?);
        let display_tz = settings.display_tz()?;
        info!(config_hash = %loaded.config_hash, "config loaded");

        Ok(Self {
            loaded,
            settings,
            session,
            display_tz,
        })
    }

    /// Parse a CLI timestamp; naive values are wall-clock time in the session zone.
    pub fn parse_at(&self, raw: &str) -> Result<DateTime<Tz>> {
        parse_timestamp(raw, self.session.tz()).with_context(|| format!("invalid timestamp '{raw}'"))
    }

    /// `--bar-size` when given, else `chart.default_bar_size`.
    pub fn bar_size_or_default(&self, raw: Option<&str>) -> Result<BarSize> {
        match raw {
            Some(raw) => parse_bar_size(raw),
            None => Ok(self.settings.chart.default_bar_size),
        }
    }

    pub async fn open_cache(&self, cache_path: Option<&Path>) -> Result<MarketDataCache> {
        let path = match cache_path {
            Some(p) => p.to_path_buf(),
            None => self.settings.cache_path()?,
        };
        let cache = MarketDataCache::open(&path, self.session.clone(), self.display_tz).await?;
        Ok(cache.with_batch_size(self.settings.cache.batch_size))
    }
}

/// Parse a CLI `--bar-size` string (`5m`, `1h`, `1D`, `bars_1d`, ...).
pub fn parse_bar_size(raw: &str) -> Result<BarSize> {
    raw.parse::<BarSize>()
        .with_context(|| format!("invalid --bar-size '{raw}'"))
}

/// One JSON document per line on stdout.
pub fn print_json_line<T: serde::Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("serialize output line")?;
    println!("{line}");
    Ok(())
}
