//! Session-boundary offset and extended-hours windows.
//!
//! [`PrePostMarketOffset`] steps through the four daily session boundaries
//! (pre-open, open, close, post-close) of each business day. Charts use it to
//! shade the pre-market and post-market windows of a visible time range.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;

use crate::error::CalendarError;
use crate::session::SessionDefinition;

/// Ranges wider than this are not shaded.
pub const MAX_WINDOW_SPAN_DAYS: i64 = 28;

const PRE_OPEN: usize = 0;
const CLOSE: usize = 2;
const LAST: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    PreMarket,
    PostMarket,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::PreMarket => "pre_market",
            WindowKind::PostMarket => "post_market",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWindow {
    pub kind: WindowKind,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

#[derive(Debug, Clone)]
pub struct PrePostMarketOffset {
    session: Arc<SessionDefinition>,
    boundaries: [NaiveTime; 4],
}

impl PrePostMarketOffset {
    pub fn new(session: Arc<SessionDefinition>) -> Self {
        let boundaries = session.hours().boundaries();
        Self {
            session,
            boundaries,
        }
    }

    pub fn boundaries(&self) -> [NaiveTime; 4] {
        self.boundaries
    }

    /// `true` when `t` is exactly a session boundary on a business day.
    pub fn is_on_offset(&self, t: DateTime<Tz>) -> bool {
        let local = self.session.local(&t);
        self.session.calendar().is_business_day(local.date())
            && self.boundaries.contains(&local.time())
    }

    /// Move `n` boundaries from `t`.
    ///
    /// An instant that is not on a boundary first snaps to the adjacent
    /// boundary in the direction of travel, which consumes one step.
    pub fn apply(&self, t: DateTime<Tz>, n: i64) -> Result<DateTime<Tz>, CalendarError> {
        if n == 0 {
            return Err(CalendarError::ZeroStep);
        }
        let local = self.session.local(&t);
        let (date, idx, consumed) = self.snap(local, n > 0);
        let remaining = if consumed { n - n.signum() } else { n };
        let (date, idx) = self.walk(date, idx, remaining);
        Ok(self.at(date, idx))
    }

    /// Latest boundary at or before `t`.
    pub fn rollback(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let (date, idx, _) = self.snap(self.session.local(&t), false);
        self.at(date, idx)
    }

    /// Earliest boundary at or after `t`.
    pub fn rollforward(&self, t: DateTime<Tz>) -> DateTime<Tz> {
        let (date, idx, _) = self.snap(self.session.local(&t), true);
        self.at(date, idx)
    }

    /// Pre-market and post-market windows intersecting `[start, end]`.
    ///
    /// Walks boundaries from `rollback(start)`, so a window already in progress
    /// at `start` is included whole. Spans wider than
    /// [`MAX_WINDOW_SPAN_DAYS`] yield no windows; zero-length windows are
    /// skipped.
    pub fn extended_hours_windows(
        &self,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Vec<SessionWindow>, CalendarError> {
        if start > end {
            return Err(CalendarError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        let mut windows = Vec::new();
        if end - start > Duration::days(MAX_WINDOW_SPAN_DAYS) {
            return Ok(windows);
        }

        let end_local = self.session.local(&end);
        let (mut date, mut idx, _) = self.snap(self.session.local(&start), false);
        loop {
            let cur = date.and_time(self.boundaries[idx]);
            if cur > end_local {
                break;
            }
            let (next_date, next_idx) = self.walk(date, idx, 1);
            let kind = match idx {
                PRE_OPEN => Some(WindowKind::PreMarket),
                CLOSE => Some(WindowKind::PostMarket),
                _ => None,
            };
            if let Some(kind) = kind {
                let next = next_date.and_time(self.boundaries[next_idx]);
                if next > cur {
                    windows.push(SessionWindow {
                        kind,
                        start: self.session.localize(cur),
                        end: self.session.localize(next),
                    });
                }
            }
            date = next_date;
            idx = next_idx;
        }
        Ok(windows)
    }

    fn at(&self, date: NaiveDate, idx: usize) -> DateTime<Tz> {
        self.session.localize(date.and_time(self.boundaries[idx]))
    }

    /// Snap onto a boundary in the given direction. The flag reports whether
    /// the snap moved off the input instant.
    fn snap(&self, local: NaiveDateTime, forward: bool) -> (NaiveDate, usize, bool) {
        let cal = self.session.calendar();
        let date = local.date();

        if !cal.is_business_day(date) {
            return if forward {
                (cal.next_business_day(date), PRE_OPEN, true)
            } else {
                (cal.previous_business_day(date), LAST, true)
            };
        }

        let time = local.time();
        if forward {
            match self.boundaries.iter().position(|b| *b >= time) {
                Some(i) => (date, i, self.boundaries[i] != time),
                None => (cal.next_business_day(date), PRE_OPEN, true),
            }
        } else {
            match self.boundaries.iter().rposition(|b| *b <= time) {
                Some(i) => (date, i, self.boundaries[i] != time),
                None => (cal.previous_business_day(date), LAST, true),
            }
        }
    }

    fn walk(&self, mut date: NaiveDate, mut idx: usize, n: i64) -> (NaiveDate, usize) {
        let cal = self.session.calendar();
        let mut n = n;
        while n > 0 {
            if idx == LAST {
                idx = PRE_OPEN;
                date = cal.next_business_day(date);
            } else {
                idx += 1;
            }
            n -= 1;
        }
        while n < 0 {
            if idx == PRE_OPEN {
                idx = LAST;
                date = cal.previous_business_day(date);
            } else {
                idx -= 1;
            }
            n += 1;
        }
        (date, idx)
    }
}
