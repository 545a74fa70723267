//! Business-day calendars.
//!
//! Deterministic, pure logic. No IO, no wall-clock.
//!
//! A [`BusinessCalendar`] is a weekday calendar minus a sorted holiday list.
//! The NYSE calendar is generated from observance rules rather than a
//! hardcoded table, so it covers every year in
//! [`NYSE_FIRST_YEAR`]..=[`NYSE_LAST_YEAR`].

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const NYSE_FIRST_YEAR: i32 = 1970;
pub const NYSE_LAST_YEAR: i32 = 2100;

// ---------------------------------------------------------------------------
// BusinessCalendar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessCalendar {
    name: String,
    /// Sorted, deduplicated, weekdays only.
    holidays: Vec<NaiveDate>,
}

impl BusinessCalendar {
    /// Monday..Friday with no holidays.
    pub fn weekdays_only() -> Self {
        Self {
            name: "WEEKDAYS".to_string(),
            holidays: Vec::new(),
        }
    }

    /// NYSE full-day closures for [`NYSE_FIRST_YEAR`]..=[`NYSE_LAST_YEAR`].
    pub fn nyse() -> Self {
        Self::nyse_between(NYSE_FIRST_YEAR, NYSE_LAST_YEAR)
    }

    pub fn nyse_between(first_year: i32, last_year: i32) -> Self {
        let holidays = (first_year..=last_year)
            .flat_map(nyse_holidays_for_year)
            .collect();
        Self {
            name: "NYSE".to_string(),
            holidays,
        }
        .normalized()
    }

    /// Add ad-hoc closures (e.g. special market closures). Weekend dates are
    /// ignored since they are already non-business days.
    pub fn with_extra_holidays(mut self, extra: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(extra);
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.holidays.retain(|d| !is_weekend(*d));
        self.holidays.sort_unstable();
        self.holidays.dedup();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holidays(&self) -> &[NaiveDate] {
        &self.holidays
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.binary_search(&date).is_ok()
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.is_holiday(date)
    }

    /// First business day strictly after `date`.
    pub fn next_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date + Duration::days(1);
        while !self.is_business_day(d) {
            d += Duration::days(1);
        }
        d
    }

    /// Last business day strictly before `date`.
    pub fn previous_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date - Duration::days(1);
        while !self.is_business_day(d) {
            d -= Duration::days(1);
        }
        d
    }

    /// `date` if it is a business day, otherwise the next one.
    pub fn roll_forward(&self, date: NaiveDate) -> NaiveDate {
        if self.is_business_day(date) {
            date
        } else {
            self.next_business_day(date)
        }
    }

    /// `date` if it is a business day, otherwise the previous one.
    pub fn roll_back(&self, date: NaiveDate) -> NaiveDate {
        if self.is_business_day(date) {
            date
        } else {
            self.previous_business_day(date)
        }
    }

    /// Signed number of business days in `[start, end)`.
    ///
    /// Negative when `end < start`: `-count(end, start)`.
    pub fn business_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        if end < start {
            return -self.business_days_between(end, start);
        }
        let lo = self.holidays.partition_point(|h| *h < start);
        let hi = self.holidays.partition_point(|h| *h < end);
        weekdays_between(start, end) - (hi - lo) as i64
    }

    /// Roll `date` forward to a business day, then move `n` business days.
    ///
    /// Inverse of [`business_days_between`](Self::business_days_between) for
    /// business-day anchors: `count(a, offset(a, n)) == n`.
    pub fn offset_business_days(&self, date: NaiveDate, n: i64) -> NaiveDate {
        let anchor = self.roll_forward(date);
        let mut candidate = anchor + Duration::days(n * 7 / 5);
        loop {
            let have = self.business_days_between(anchor, candidate);
            if have == n {
                return self.roll_forward(candidate);
            }
            // Moving k calendar days changes the count by at most k, so the
            // correction never overshoots.
            candidate += Duration::days(n - have);
        }
    }

    /// Business days in the inclusive range `[start, end]`.
    pub fn business_days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        if end < start {
            return out;
        }
        let mut d = self.roll_forward(start);
        while d <= end {
            out.push(d);
            d = self.next_business_day(d);
        }
        out
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Weekdays in `[start, end)`, `start <= end`.
fn weekdays_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = (end - start).num_days();
    let full_weeks = days / 7;
    let mut count = full_weeks * 5;
    let mut d = start + Duration::days(full_weeks * 7);
    while d < end {
        if !is_weekend(d) {
            count += 1;
        }
        d += Duration::days(1);
    }
    count
}

// ---------------------------------------------------------------------------
// NYSE holiday rules
// ---------------------------------------------------------------------------

/// Observed NYSE full-day closures for one year.
///
/// Rules:
/// - New Year's Day: Sunday observed Monday; Saturday not observed.
/// - MLK Day: 3rd Monday of January, from 1998.
/// - Washington's Birthday: Feb 22 observed until 1970, 3rd Monday of
///   February from 1971.
/// - Good Friday.
/// - Memorial Day: last Monday of May from 1971, May 30 observed before.
/// - Juneteenth: from 2022.
/// - Independence Day, Christmas: Saturday -> Friday, Sunday -> Monday.
/// - Labor Day: 1st Monday of September.
/// - Thanksgiving: 4th Thursday of November.
///
/// One-off closures (national days of mourning, weather) are not rule based;
/// supply them through [`BusinessCalendar::with_extra_holidays`].
pub fn nyse_holidays_for_year(year: i32) -> Vec<NaiveDate> {
    let mut days: Vec<Option<NaiveDate>> = Vec::with_capacity(10);

    let new_year = NaiveDate::from_ymd_opt(year, 1, 1);
    days.push(new_year.and_then(|d| match d.weekday() {
        Weekday::Sun => d.succ_opt(),
        Weekday::Sat => None,
        _ => Some(d),
    }));

    if year >= 1998 {
        days.push(NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 3));
    }

    if year >= 1971 {
        days.push(NaiveDate::from_weekday_of_month_opt(year, 2, Weekday::Mon, 3));
    } else {
        days.push(NaiveDate::from_ymd_opt(year, 2, 22).map(observed));
    }

    days.push(easter_sunday(year).map(|e| e - Duration::days(2)));

    if year >= 1971 {
        days.push(last_weekday_of_month(year, 5, Weekday::Mon));
    } else {
        days.push(NaiveDate::from_ymd_opt(year, 5, 30).map(observed));
    }

    if year >= 2022 {
        days.push(NaiveDate::from_ymd_opt(year, 6, 19).map(observed));
    }

    days.push(NaiveDate::from_ymd_opt(year, 7, 4).map(observed));
    days.push(NaiveDate::from_weekday_of_month_opt(year, 9, Weekday::Mon, 1));
    days.push(NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4));
    days.push(NaiveDate::from_ymd_opt(year, 12, 25).map(observed));

    days.into_iter().flatten().collect()
}

/// Saturday holidays move to Friday, Sunday holidays to Monday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let mut d = NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()?;
    while d.weekday() != weekday {
        d = d.pred_opt()?;
    }
    Some(d)
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
