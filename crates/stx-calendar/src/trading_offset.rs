//! Trading-time offset engine.
//!
//! A [`TradingOffset`] turns wall-clock time into bar-grid time for one bar
//! size on one session. Intraday sizes step through the bars of each
//! business day and jump from the last bar of a day straight to the first
//! bar of the next business day. Daily, weekly, and monthly sizes step through
//! business days, calendar weeks, and calendar months respectively.
//!
//! It also maps instants onto a continuous trading-time coordinate (seconds of
//! session time since the epoch) so charts can lay bars out without gaps for
//! nights, weekends, and holidays.

use std::sync::Arc;

use chrono::{
    DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::bar_size::BarSize;
use crate::error::CalendarError;
use crate::session::SessionDefinition;

/// Which pair of session boundaries bounds the intraday grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBounds {
    /// Pre-market open through post-market close.
    #[default]
    Extended,
    /// Regular open through regular close.
    Regular,
}

/// Coordinates further than this many business days from the epoch are
/// rejected by [`TradingOffset::from_timestamp`].
const MAX_COORDINATE_DAYS: f64 = 100_000.0;

#[derive(Debug, Clone)]
pub struct TradingOffset {
    bar_size: BarSize,
    session: Arc<SessionDefinition>,
    bounds: SessionBounds,
    /// First bar of the day (grid-snapped for intraday sizes).
    open: NaiveTime,
    /// Last bar of the day, `close - step`. Equal to `open` for multiday sizes.
    last_bar: NaiveTime,
    seconds_per_session: i64,
    epoch: NaiveDate,
}

impl TradingOffset {
    pub fn new(bar_size: BarSize, session: Arc<SessionDefinition>) -> Result<Self, CalendarError> {
        Self::with_bounds(bar_size, session, SessionBounds::Extended)
    }

    pub fn with_bounds(
        bar_size: BarSize,
        session: Arc<SessionDefinition>,
        bounds: SessionBounds,
    ) -> Result<Self, CalendarError> {
        let hours = session.hours();
        let (start, end) = match bounds {
            SessionBounds::Extended => (hours.pre_open, hours.post_close),
            SessionBounds::Regular => (hours.open, hours.close),
        };
        let start_s = start.num_seconds_from_midnight() as i64;
        let end_s = end.num_seconds_from_midnight() as i64;

        let (open_s, close_s, last_s) = match bar_size.seconds() {
            Some(step) => {
                let open_s = start_s - start_s % step;
                let close_s = end_s - end_s % step;
                (open_s, close_s, close_s - step)
            }
            None => (start_s, end_s, start_s),
        };

        let seconds_per_session = close_s - open_s;
        if seconds_per_session <= 0 {
            return Err(CalendarError::InvalidSession(format!(
                "session {start}-{end} holds no complete {bar_size} bar"
            )));
        }

        // 1970-01-01, rolled onto the calendar.
        let epoch = session.calendar().roll_forward(NaiveDate::default());

        Ok(Self {
            bar_size,
            bounds,
            open: time_of(open_s),
            last_bar: time_of(last_s),
            seconds_per_session,
            epoch,
            session,
        })
    }

    pub fn bar_size(&self) -> BarSize {
        self.bar_size
    }

    pub fn bounds(&self) -> SessionBounds {
        self.bounds
    }

    pub fn session(&self) -> &Arc<SessionDefinition> {
        &self.session
    }

    /// Length of one session in coordinate seconds.
    pub fn seconds_per_session(&self) -> i64 {
        self.seconds_per_session
    }

    /// First and last bar start of a trading day (session-local).
    pub fn daily_bar_range(&self) -> (NaiveTime, NaiveTime) {
        (self.open, self.last_bar)
    }

    // -----------------------------------------------------------------------
    // Grid movement
    // -----------------------------------------------------------------------

    /// Floor `t` onto the bar grid.
    ///
    /// Intraday sizes floor the time of day to a multiple of the bar length;
    /// the result may lie outside session hours. 1D floors to local midnight.
    /// 1W/1M floor to the latest grid point (first business day of a week or
    /// month) at or before `t`.
    pub fn round(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let local = self.session.local(&t);
        self.session.localize(self.round_local(local))
    }

    /// Next grid point strictly after `round(t)`.
    pub fn step_forward(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let local = self.session.local(&t);
        self.session.localize(self.step_local(local, true))
    }

    /// Previous grid point strictly before `round(t)`.
    pub fn step_backward(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let local = self.session.local(&t);
        self.session.localize(self.step_local(local, false))
    }

    /// Move `n` bars (negative = backward). `n == 0` rounds.
    pub fn apply(&self, t: DateTime<Tz>, n: i64) -> DateTime<Tz> {
        let mut local = self.session.local(&t);
        if n == 0 {
            return self.session.localize(self.round_local(local));
        }
        let forward = n > 0;
        for _ in 0..n.unsigned_abs() {
            local = self.step_local(local, forward);
        }
        self.session.localize(local)
    }

    /// Latest bar start at or before `t`.
    pub fn rollback(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let r = self.round(t);
        if self.is_on_offset(r) {
            r
        } else {
            self.step_backward(t)
        }
    }

    /// Earliest bar start at or after `t`.
    pub fn rollforward(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        if self.is_on_offset(t) {
            t
        } else {
            self.step_forward(t)
        }
    }

    /// `true` when `t` is exactly a bar start on a business day.
    pub fn is_on_offset(&self, t: DateTime<Tz>) -> bool {
        let local = self.session.local(&t);
        let date = local.date();
        if self.round_local(local) != local {
            return false;
        }
        let cal = self.session.calendar();
        match self.bar_size {
            BarSize::D1 => cal.is_business_day(date),
            BarSize::W1 | BarSize::Mo1 => true,
            _ => {
                cal.is_business_day(date) && local.time() >= self.open && local.time() <= self.last_bar
            }
        }
    }

    fn round_local(&self, local: NaiveDateTime) -> NaiveDateTime {
        match self.bar_size.seconds() {
            Some(step) => {
                let secs = local.time().num_seconds_from_midnight() as i64;
                local.date().and_time(time_of(secs - secs % step))
            }
            None => match self.bar_size {
                BarSize::W1 | BarSize::Mo1 => midnight(self.period_floor(local.date())),
                _ => midnight(local.date()),
            },
        }
    }

    fn step_local(&self, local: NaiveDateTime, forward: bool) -> NaiveDateTime {
        let r = self.round_local(local);
        let date = r.date();
        let cal = self.session.calendar();

        let Some(step) = self.bar_size.seconds() else {
            let next = match self.bar_size {
                BarSize::D1 if forward => cal.next_business_day(date),
                BarSize::D1 => cal.previous_business_day(date),
                _ => self.adjacent_grid_point(date, forward),
            };
            return midnight(next);
        };

        if !cal.is_business_day(date) {
            return if forward {
                cal.next_business_day(date).and_time(self.open)
            } else {
                cal.previous_business_day(date).and_time(self.last_bar)
            };
        }

        let day_open = date.and_time(self.open);
        let day_last = date.and_time(self.last_bar);
        let step = Duration::seconds(step);

        if forward {
            let new = r + step;
            if new < day_open {
                day_open
            } else if new > day_last {
                cal.next_business_day(date).and_time(self.open)
            } else {
                new
            }
        } else {
            let new = r - step;
            if new < day_open {
                cal.previous_business_day(date).and_time(self.last_bar)
            } else if new > day_last {
                day_last
            } else {
                new
            }
        }
    }

    // -----------------------------------------------------------------------
    // Weekly / monthly grid
    // -----------------------------------------------------------------------

    fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self.bar_size {
            BarSize::W1 => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            _ => date.with_day(1).unwrap_or(date),
        }
    }

    fn shift_period(&self, period_start: NaiveDate, forward: bool) -> NaiveDate {
        match (self.bar_size, forward) {
            (BarSize::W1, true) => period_start + Duration::days(7),
            (BarSize::W1, false) => period_start - Duration::days(7),
            (_, true) => period_start
                .checked_add_months(Months::new(1))
                .unwrap_or(period_start),
            (_, false) => period_start
                .checked_sub_months(Months::new(1))
                .unwrap_or(period_start),
        }
    }

    /// First business day of the period, if the period has one.
    fn grid_point(&self, period_start: NaiveDate) -> Option<NaiveDate> {
        let next_period = self.shift_period(period_start, true);
        let first = self.session.calendar().roll_forward(period_start);
        (first < next_period).then_some(first)
    }

    fn period_floor(&self, date: NaiveDate) -> NaiveDate {
        let mut period = self.period_start(date);
        loop {
            if let Some(g) = self.grid_point(period) {
                if g <= date {
                    return g;
                }
            }
            period = self.shift_period(period, false);
        }
    }

    fn adjacent_grid_point(&self, date: NaiveDate, forward: bool) -> NaiveDate {
        let mut period = self.period_start(date);
        loop {
            period = self.shift_period(period, forward);
            if let Some(g) = self.grid_point(period) {
                return g;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Trading-time coordinates
    // -----------------------------------------------------------------------

    /// Continuous trading-time coordinate of `t`, in session seconds.
    ///
    /// `business_days(epoch, date) * seconds_per_session` plus the time since
    /// the first bar of the day, clamped into `[0, seconds_per_session]`.
    /// Instants on non-business days map to the start of that day's slot.
    pub fn timestamp(&self, t: DateTime<Tz>) -> f64 {
        let local = self.session.local(&t);
        let date = local.date();
        let cal = self.session.calendar();
        let sps = self.seconds_per_session as f64;

        let days = cal.business_days_between(self.epoch, date);
        let base = days as f64 * sps;
        if !cal.is_business_day(date) {
            return base;
        }
        let since_open = (local - date.and_time(self.open)).num_milliseconds() as f64 / 1_000.0;
        base + since_open.clamp(0.0, sps)
    }

    /// Inverse of [`timestamp`](Self::timestamp), expressed in `tz`.
    ///
    /// Exact for instants inside session hours on business days; clamped
    /// instants come back as the session boundary they were clamped to.
    pub fn from_timestamp(&self, coord: f64, tz: Tz) -> Result<DateTime<Tz>, CalendarError> {
        let sps = self.seconds_per_session as f64;
        let days = (coord / sps).floor();
        if !coord.is_finite() || days.abs() > MAX_COORDINATE_DAYS {
            return Err(CalendarError::CoordinateOutOfRange(coord));
        }
        let remainder = coord - days * sps;
        let date = self
            .session
            .calendar()
            .offset_business_days(self.epoch, days as i64);
        let naive =
            date.and_time(self.open) + Duration::milliseconds((remainder * 1_000.0).round() as i64);
        Ok(self.session.localize(naive).with_timezone(&tz))
    }
}

fn time_of(secs: i64) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(secs.rem_euclid(86_400) as u32, 0)
        .unwrap_or(NaiveTime::MIN)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session() -> Arc<SessionDefinition> {
        Arc::new(SessionDefinition::us_equities())
    }

    fn et(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        chrono_tz::US::Eastern
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn offset(size: BarSize) -> TradingOffset {
        TradingOffset::new(size, session()).unwrap()
    }

    #[test]
    fn extended_grid_bounds_for_five_minutes() {
        let off = offset(BarSize::M5);
        assert_eq!(
            off.daily_bar_range(),
            (
                NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(19, 55, 0).unwrap()
            )
        );
        assert_eq!(off.seconds_per_session(), 16 * 3_600);
    }

    #[test]
    fn regular_bounds_snap_open_to_the_grid() {
        let off = TradingOffset::with_bounds(BarSize::H1, session(), SessionBounds::Regular).unwrap();
        // 09:30 floors to 09:00 on an hourly grid.
        assert_eq!(
            off.daily_bar_range(),
            (
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(15, 0, 0).unwrap()
            )
        );
    }

    #[test]
    fn last_bar_steps_to_next_business_day_open() {
        let off = offset(BarSize::M5);
        // Thu 2024-03-28 19:55 -> Good Friday and weekend skipped -> Mon 04:00.
        let next = off.step_forward(et(2024, 3, 28, 19, 55));
        assert_eq!(next, et(2024, 4, 1, 4, 0));
        assert_eq!(off.step_backward(next), et(2024, 3, 28, 19, 55));
    }

    #[test]
    fn before_open_steps_to_today_open() {
        let off = offset(BarSize::M5);
        assert_eq!(off.step_forward(et(2024, 3, 5, 2, 13)), et(2024, 3, 5, 4, 0));
        assert_eq!(off.step_backward(et(2024, 3, 5, 2, 13)), et(2024, 3, 4, 19, 55));
    }

    #[test]
    fn after_close_steps_backward_to_last_bar() {
        let off = offset(BarSize::M5);
        assert_eq!(off.step_backward(et(2024, 3, 5, 22, 0)), et(2024, 3, 5, 19, 55));
        assert_eq!(off.step_forward(et(2024, 3, 5, 22, 0)), et(2024, 3, 6, 4, 0));
    }

    #[test]
    fn weekend_instants_enter_the_adjacent_session() {
        let off = offset(BarSize::M1);
        let saturday = et(2024, 3, 9, 12, 0);
        assert_eq!(off.step_forward(saturday), et(2024, 3, 11, 4, 0));
        assert_eq!(off.step_backward(saturday), et(2024, 3, 8, 19, 59));
    }

    #[test]
    fn apply_zero_rounds_and_is_idempotent() {
        let off = offset(BarSize::M15);
        let t = et(2024, 3, 5, 10, 7);
        let r = off.apply(t, 0);
        assert_eq!(r, et(2024, 3, 5, 10, 0));
        assert_eq!(off.apply(r, 0), r);
        assert!(off.is_on_offset(r));
        assert!(!off.is_on_offset(t));
    }

    #[test]
    fn apply_n_equals_repeated_steps() {
        let off = offset(BarSize::M30);
        let start = et(2024, 3, 5, 18, 0);
        let mut walked = start;
        for _ in 0..7 {
            walked = off.step_forward(walked);
        }
        assert_eq!(off.apply(start, 7), walked);
        assert_eq!(off.apply(walked, -7), start);
    }

    #[test]
    fn rolls_land_on_session_bars() {
        let off = offset(BarSize::M5);
        assert_eq!(off.rollback(et(2024, 3, 5, 10, 7)), et(2024, 3, 5, 10, 5));
        assert_eq!(off.rollforward(et(2024, 3, 5, 10, 7)), et(2024, 3, 5, 10, 10));
        assert_eq!(off.rollback(et(2024, 3, 5, 22, 0)), et(2024, 3, 5, 19, 55));
        assert_eq!(off.rollforward(et(2024, 3, 5, 22, 0)), et(2024, 3, 6, 4, 0));
        assert_eq!(off.rollback(et(2024, 3, 9, 12, 0)), et(2024, 3, 8, 19, 55));
        let on = et(2024, 3, 5, 4, 0);
        assert_eq!(off.rollback(on), on);
        assert_eq!(off.rollforward(on), on);

        let daily = offset(BarSize::D1);
        assert_eq!(daily.rollback(et(2024, 3, 9, 12, 0)), et(2024, 3, 8, 0, 0));
        assert_eq!(daily.rollback(et(2024, 3, 8, 12, 0)), et(2024, 3, 8, 0, 0));
    }

    #[test]
    fn daily_steps_skip_holidays() {
        let off = offset(BarSize::D1);
        let next = off.step_forward(et(2024, 7, 3, 15, 0));
        assert_eq!(next, et(2024, 7, 5, 0, 0));
        assert_eq!(off.step_backward(next), et(2024, 7, 3, 0, 0));
        assert!(off.is_on_offset(next));
        assert!(!off.is_on_offset(et(2024, 7, 4, 0, 0)));
    }

    #[test]
    fn monthly_grid_uses_first_business_day() {
        let off = offset(BarSize::Mo1);
        // 2024-01-01 is a holiday; the January grid point is Jan 2.
        assert_eq!(off.round(et(2024, 1, 20, 11, 0)), et(2024, 1, 2, 0, 0));
        // Jan 1 itself precedes January's grid point, so it floors to December's.
        assert_eq!(off.round(et(2024, 1, 1, 11, 0)), et(2023, 12, 1, 0, 0));
        assert_eq!(off.step_forward(et(2024, 1, 20, 11, 0)), et(2024, 2, 1, 0, 0));
        assert_eq!(off.step_backward(et(2024, 1, 20, 11, 0)), et(2023, 12, 1, 0, 0));
    }

    #[test]
    fn weekly_grid_uses_first_business_day_of_week() {
        let off = offset(BarSize::W1);
        // Week of 2024-05-27 starts with Memorial Day; grid point is Tuesday.
        assert_eq!(off.round(et(2024, 5, 30, 9, 0)), et(2024, 5, 28, 0, 0));
        assert_eq!(off.step_forward(et(2024, 5, 30, 9, 0)), et(2024, 6, 3, 0, 0));
        assert_eq!(off.step_backward(et(2024, 5, 30, 9, 0)), et(2024, 5, 20, 0, 0));
    }

    #[test]
    fn coordinates_are_continuous_across_the_overnight_gap() {
        let off = offset(BarSize::M5);
        let last = off.timestamp(et(2024, 3, 5, 19, 55));
        let next_open = off.timestamp(et(2024, 3, 6, 4, 0));
        // Last bar start plus one bar equals the next day's open.
        assert_eq!(next_open - last, 300.0);
        // Anything after close clamps to the session end.
        assert_eq!(off.timestamp(et(2024, 3, 5, 23, 0)), next_open);
    }

    #[test]
    fn coordinates_are_monotonic() {
        let off = offset(BarSize::M5);
        let mut t = et(2024, 3, 1, 4, 0);
        let mut prev = off.timestamp(t);
        for _ in 0..2_000 {
            t = off.step_forward(t);
            let c = off.timestamp(t);
            assert!(c > prev, "coordinate went backwards at {t}");
            prev = c;
        }
    }

    #[test]
    fn from_timestamp_inverts_in_session_instants() {
        let off = offset(BarSize::M1);
        for t in [
            et(1999, 12, 31, 4, 0),
            et(2024, 3, 5, 12, 34),
            et(2024, 3, 11, 4, 1),
            et(2024, 11, 4, 19, 59),
        ] {
            let back = off.from_timestamp(off.timestamp(t), chrono_tz::US::Eastern).unwrap();
            assert_eq!(back, t);
        }
    }

    #[test]
    fn from_timestamp_converts_to_the_requested_zone() {
        let off = offset(BarSize::M1);
        let t = et(2024, 3, 5, 12, 34);
        let back = off.from_timestamp(off.timestamp(t), chrono_tz::US::Pacific).unwrap();
        assert_eq!(back.naive_local().time(), NaiveTime::from_hms_opt(9, 34, 0).unwrap());
        assert_eq!(back, t);
    }

    #[test]
    fn non_finite_coordinate_is_rejected() {
        let off = offset(BarSize::M1);
        assert!(off.from_timestamp(f64::NAN, chrono_tz::UTC).is_err());
        assert!(off.from_timestamp(f64::INFINITY, chrono_tz::UTC).is_err());
    }

    #[test]
    fn coordinates_far_from_the_epoch_are_rejected() {
        let off = offset(BarSize::M1);
        let sps = off.timestamp(et(2024, 3, 6, 4, 0)) - off.timestamp(et(2024, 3, 5, 4, 0));

        assert!(matches!(
            off.from_timestamp(100_001.0 * sps, chrono_tz::UTC),
            Err(CalendarError::CoordinateOutOfRange(_))
        ));
        assert!(matches!(
            off.from_timestamp(-100_002.0 * sps, chrono_tz::UTC),
            Err(CalendarError::CoordinateOutOfRange(_))
        ));

        // Signed counting before the epoch.
        let before = off
            .from_timestamp(-10.0 * sps, chrono_tz::US::Eastern)
            .expect("pre-epoch coordinate");
        assert_eq!(before.naive_local().date().year(), 1969);
    }

    #[test]
    fn session_shorter_than_a_bar_is_rejected() {
        let hours = crate::session::MarketHours::parse("09:30", "09:30", "10:00", "10:00").unwrap();
        let s = Arc::new(SessionDefinition::new(
            chrono_tz::US::Eastern,
            hours,
            crate::business_day::BusinessCalendar::weekdays_only(),
        ));
        assert!(matches!(
            TradingOffset::new(BarSize::H1, s),
            Err(CalendarError::InvalidSession(_))
        ));
    }
}
