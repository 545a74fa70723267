//! Bar sizes supported by the offset engine and the cache.
//!
//! Canonical tags follow the charting convention: lowercase `m` is minutes,
//! uppercase `M` is months. Because SQLite table names are case-insensitive,
//! [`BarSize::table_tag`] provides a distinct spelling for storage.

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BarSize {
    #[serde(rename = "1s")]
    S1,
    #[serde(rename = "5s")]
    S5,
    #[serde(rename = "10s")]
    S10,
    #[serde(rename = "15s")]
    S15,
    #[serde(rename = "30s")]
    S30,
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "2m")]
    M2,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "10m")]
    M10,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "20m")]
    M20,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "3h")]
    H3,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "1D")]
    D1,
    #[serde(rename = "1W")]
    W1,
    #[serde(rename = "1M")]
    Mo1,
}

impl BarSize {
    pub const ALL: [BarSize; 21] = [
        BarSize::S1,
        BarSize::S5,
        BarSize::S10,
        BarSize::S15,
        BarSize::S30,
        BarSize::M1,
        BarSize::M2,
        BarSize::M3,
        BarSize::M5,
        BarSize::M10,
        BarSize::M15,
        BarSize::M20,
        BarSize::M30,
        BarSize::H1,
        BarSize::H2,
        BarSize::H3,
        BarSize::H4,
        BarSize::H8,
        BarSize::D1,
        BarSize::W1,
        BarSize::Mo1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BarSize::S1 => "1s",
            BarSize::S5 => "5s",
            BarSize::S10 => "10s",
            BarSize::S15 => "15s",
            BarSize::S30 => "30s",
            BarSize::M1 => "1m",
            BarSize::M2 => "2m",
            BarSize::M3 => "3m",
            BarSize::M5 => "5m",
            BarSize::M10 => "10m",
            BarSize::M15 => "15m",
            BarSize::M20 => "20m",
            BarSize::M30 => "30m",
            BarSize::H1 => "1h",
            BarSize::H2 => "2h",
            BarSize::H3 => "3h",
            BarSize::H4 => "4h",
            BarSize::H8 => "8h",
            BarSize::D1 => "1D",
            BarSize::W1 => "1W",
            BarSize::Mo1 => "1M",
        }
    }

    /// Storage spelling, unique under case-insensitive comparison.
    pub fn table_tag(&self) -> &'static str {
        match self {
            BarSize::D1 => "1d",
            BarSize::W1 => "1w",
            BarSize::Mo1 => "1mo",
            other => other.as_str(),
        }
    }

    /// Parse a bar-size tag.
    ///
    /// `m` (minutes) and `M` (months) are distinguished by case; other units
    /// are case-insensitive. A leading `bars_` prefix (legacy table naming) is
    /// accepted, as are the storage spellings from [`BarSize::table_tag`].
    pub fn parse(s: &str) -> Result<Self, CalendarError> {
        let raw = s.trim();
        let tag = raw.strip_prefix("bars_").unwrap_or(raw);

        if let Some(size) = Self::ALL.iter().find(|b| b.as_str() == tag) {
            return Ok(*size);
        }

        match tag.to_ascii_lowercase().as_str() {
            "1mo" | "1mon" | "1month" => return Ok(BarSize::Mo1),
            "1min" => return Ok(BarSize::M1),
            "1d" | "1day" => return Ok(BarSize::D1),
            "1w" | "1wk" | "1week" => return Ok(BarSize::W1),
            _ => {}
        }

        // Seconds and hours are unambiguous in either case.
        if tag.ends_with('S') || tag.ends_with('H') {
            let lowered = tag.to_ascii_lowercase();
            if let Some(size) = Self::ALL.iter().find(|b| b.as_str() == lowered) {
                return Ok(*size);
            }
        }

        Err(CalendarError::InvalidBarSize(raw.to_string()))
    }

    /// Fixed bar length in seconds for intraday sizes; `None` for 1D/1W/1M.
    pub fn seconds(&self) -> Option<i64> {
        let secs = match self {
            BarSize::S1 => 1,
            BarSize::S5 => 5,
            BarSize::S10 => 10,
            BarSize::S15 => 15,
            BarSize::S30 => 30,
            BarSize::M1 => 60,
            BarSize::M2 => 120,
            BarSize::M3 => 180,
            BarSize::M5 => 300,
            BarSize::M10 => 600,
            BarSize::M15 => 900,
            BarSize::M20 => 1_200,
            BarSize::M30 => 1_800,
            BarSize::H1 => 3_600,
            BarSize::H2 => 7_200,
            BarSize::H3 => 10_800,
            BarSize::H4 => 14_400,
            BarSize::H8 => 28_800,
            BarSize::D1 | BarSize::W1 | BarSize::Mo1 => return None,
        };
        Some(secs)
    }

    pub fn is_intraday(&self) -> bool {
        self.seconds().is_some()
    }
}

impl fmt::Display for BarSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarSize {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarSize::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Infer the bar size of a series from the median spacing of its timestamps.
///
/// Returns `None` for fewer than two timestamps or when the median spacing
/// matches no supported size. Multiday spacing is compared in whole days so
/// DST transitions do not matter.
pub fn infer_bar_size(timestamps: &[DateTime<Tz>]) -> Option<BarSize> {
    let mut diffs: Vec<i64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds().abs())
        .filter(|d| *d > 0)
        .collect();
    if diffs.is_empty() {
        return None;
    }
    diffs.sort_unstable();
    let median = diffs[diffs.len() / 2];

    if median >= 20 * 3_600 {
        let days = (median + 43_200) / 86_400;
        return match days {
            1 => Some(BarSize::D1),
            7 => Some(BarSize::W1),
            28..=31 => Some(BarSize::Mo1),
            _ => None,
        };
    }

    BarSize::ALL
        .iter()
        .find(|b| b.seconds() == Some(median))
        .copied()
}
