//! Session definitions: where a trading day starts and ends, in which zone,
//! on which business-day calendar.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::business_day::BusinessCalendar;
use crate::error::CalendarError;

/// The four daily boundaries of an extended session, in session-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub pre_open: NaiveTime,
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub post_close: NaiveTime,
}

impl MarketHours {
    /// Requires `pre_open <= open < close <= post_close`.
    pub fn new(
        pre_open: NaiveTime,
        open: NaiveTime,
        close: NaiveTime,
        post_close: NaiveTime,
    ) -> Result<Self, CalendarError> {
        if !(pre_open <= open && open < close && close <= post_close) {
            return Err(CalendarError::InvalidSession(format!(
                "expected pre_open <= open < close <= post_close, got {pre_open} {open} {close} {post_close}"
            )));
        }
        Ok(Self {
            pre_open,
            open,
            close,
            post_close,
        })
    }

    /// Parse `"HH:MM"` / `"HH:MM:SS"` boundaries.
    pub fn parse(
        pre_open: &str,
        open: &str,
        close: &str,
        post_close: &str,
    ) -> Result<Self, CalendarError> {
        Self::new(
            parse_time("pre_market_open", pre_open)?,
            parse_time("market_open", open)?,
            parse_time("market_close", close)?,
            parse_time("post_market_close", post_close)?,
        )
    }

    /// 04:00 / 09:30 / 16:00 / 20:00.
    pub fn us_equities() -> Self {
        Self {
            pre_open: hm(4, 0),
            open: hm(9, 30),
            close: hm(16, 0),
            post_close: hm(20, 0),
        }
    }

    pub fn boundaries(&self) -> [NaiveTime; 4] {
        [self.pre_open, self.open, self.close, self.post_close]
    }
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

pub fn parse_time(field: &'static str, raw: &str) -> Result<NaiveTime, CalendarError> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| CalendarError::InvalidTime {
            field,
            raw: raw.to_string(),
        })
}

pub fn parse_timezone(name: &str) -> Result<Tz, CalendarError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CalendarError::InvalidTimezone(name.to_string()))
}

// ---------------------------------------------------------------------------
// SessionDefinition
// ---------------------------------------------------------------------------

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDefinition {
    tz: Tz,
    hours: MarketHours,
    calendar: BusinessCalendar,
}

impl SessionDefinition {
    pub fn new(tz: Tz, hours: MarketHours, calendar: BusinessCalendar) -> Self {
        Self {
            tz,
            hours,
            calendar,
        }
    }

    /// US equities: US/Eastern, 04:00-20:00 extended, 09:30-16:00 regular,
    /// NYSE holidays.
    pub fn us_equities() -> Self {
        Self::new(
            chrono_tz::US::Eastern,
            MarketHours::us_equities(),
            BusinessCalendar::nyse(),
        )
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn hours(&self) -> &MarketHours {
        &self.hours
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    /// Wall-clock time of `t` in the session zone.
    pub fn local<Z: TimeZone>(&self, t: &DateTime<Z>) -> NaiveDateTime {
        t.with_timezone(&self.tz).naive_local()
    }

    /// Attach the session zone to a session-local wall-clock time.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        localize(&self.tz, naive)
    }

    /// Local midnight of `date` in the session zone.
    pub fn midnight(&self, date: NaiveDate) -> DateTime<Tz> {
        self.localize(date.and_time(NaiveTime::MIN))
    }

    /// The session boundaries on `date`, expressed as wall-clock times in
    /// `tz`. Used to draw session markers on charts shown in another zone.
    pub fn market_hours_in(&self, tz: Tz, date: NaiveDate) -> [NaiveTime; 4] {
        self.hours
            .boundaries()
            .map(|b| self.localize(date.and_time(b)).with_timezone(&tz).time())
    }
}

/// Resolve a wall-clock time in `tz`.
///
/// Ambiguous times (fall-back) resolve to the earlier instant; times inside a
/// spring-forward gap are pushed forward by the gap.
pub fn localize(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => localize(tz, naive + Duration::hours(1)),
    }
}

/// Parse a user-supplied timestamp.
///
/// Accepts RFC 3339 (any offset), `YYYY-MM-DD[ T]HH:MM[:SS]` and
/// `YYYY-MM-DD` (both read as wall-clock time in `tz`), or integer epoch
/// seconds.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Result<DateTime<Tz>, CalendarError> {
    let s = raw.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&tz));
    }

    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(localize(&tz, naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(localize(&tz, date.and_time(NaiveTime::MIN)));
    }

    if let Ok(secs) = s.parse::<i64>() {
        if let Some(t) = DateTime::<Utc>::from_timestamp(secs, 0) {
            return Ok(t.with_timezone(&tz));
        }
    }

    Err(CalendarError::InvalidTimestamp(raw.to_string()))
}
