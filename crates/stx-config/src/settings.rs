//! Typed view over the merged configuration document.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stx_cache::{DEFAULT_BATCH_SIZE, ENV_CACHE_PATH};
use stx_calendar::{
    parse_timezone, BarSize, BusinessCalendar, MarketHours, SessionBounds, SessionDefinition,
};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalendarKind {
    #[default]
    Nyse,
    Weekdays,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StonxConfig {
    /// Zone bars are returned in.
    pub display_timezone: String,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub chart: ChartConfig,
}

impl Default for StonxConfig {
    fn default() -> Self {
        Self {
            display_timezone: "US/Pacific".to_string(),
            session: SessionConfig::default(),
            cache: CacheConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timezone: String,
    pub pre_market_open: String,
    pub market_open: String,
    pub market_close: String,
    pub post_market_close: String,
    pub calendar: CalendarKind,
    /// Ad-hoc full-day closures on top of the calendar rules.
    pub extra_holidays: Vec<NaiveDate>,
    pub bounds: SessionBounds,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: "US/Eastern".to_string(),
            pre_market_open: "04:00".to_string(),
            market_open: "09:30".to_string(),
            market_close: "16:00".to_string(),
            post_market_close: "20:00".to_string(),
            calendar: CalendarKind::Nyse,
            extra_holidays: Vec::new(),
            bounds: SessionBounds::Extended,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `None` falls back to [`default_cache_path`].
    pub path: Option<PathBuf>,
    pub batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub pre_post_market_highlight: bool,
    pub default_bar_size: BarSize,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            pre_post_market_highlight: true,
            default_bar_size: BarSize::D1,
        }
    }
}

impl StonxConfig {
    /// Deserialize with defaults. Schema mismatches degrade to defaults with
    /// a warning. A flat `timezone_tws` key is honoured when
    /// `display_timezone` is absent.
    pub fn from_json(v: &Value) -> Self {
        let mut cfg = match serde_json::from_value::<StonxConfig>(v.clone()) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "config does not match schema; using defaults");
                StonxConfig::default()
            }
        };
        if v.get("display_timezone").is_none() {
            if let Some(tz) = v.get("timezone_tws").and_then(Value::as_str) {
                cfg.display_timezone = tz.to_string();
            }
        }
        cfg
    }

    pub fn display_tz(&self) -> Result<Tz> {
        parse_timezone(&self.display_timezone).context("display_timezone")
    }

    pub fn session_definition(&self) -> Result<SessionDefinition> {
        self.session.to_definition()
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache.path {
            Some(p) => Ok(p.clone()),
            None => default_cache_path(),
        }
    }
}

impl SessionConfig {
    pub fn to_definition(&self) -> Result<SessionDefinition> {
        let tz = parse_timezone(&self.timezone).context("session.timezone")?;
        let hours = MarketHours::parse(
            &self.pre_market_open,
            &self.market_open,
            &self.market_close,
            &self.post_market_close,
        )
        .context("session hours")?;
        let calendar = match self.calendar {
            CalendarKind::Nyse => BusinessCalendar::nyse(),
            CalendarKind::Weekdays => BusinessCalendar::weekdays_only(),
        }
        .with_extra_holidays(self.extra_holidays.iter().copied());
        Ok(SessionDefinition::new(tz, hours, calendar))
    }
}

// ---------------------------------------------------------------------------
// Default locations
// ---------------------------------------------------------------------------

/// `STX_CACHE_PATH`, else `cache.sqlite` in the app data directory.
pub fn default_cache_path() -> Result<PathBuf> {
    default_cache_path_from(|k| std::env::var(k).ok())
}

pub fn default_cache_path_from(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(p) = env(ENV_CACHE_PATH).filter(|s| !s.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    app_data_dir_from(&env)
        .map(|dir| dir.join("cache.sqlite"))
        .ok_or_else(|| anyhow!("cannot determine cache path: set {ENV_CACHE_PATH} or HOME"))
}

/// `%LOCALAPPDATA%/StonX`, `$XDG_DATA_HOME/stonx`, or `$HOME/.local/share/stonx`.
pub fn app_data_dir_from(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    let get = |k: &str| env(k).filter(|s| !s.is_empty());
    if let Some(d) = get("LOCALAPPDATA") {
        return Some(PathBuf::from(d).join("StonX"));
    }
    if let Some(d) = get("XDG_DATA_HOME") {
        return Some(PathBuf::from(d).join("stonx"));
    }
    get("HOME").map(|h| PathBuf::from(h).join(".local").join("share").join("stonx"))
}
