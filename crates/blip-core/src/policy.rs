//! Reset policy engine.
//!
//! Pure, calendar-aware decisions about periodic resets:
//!
//! - [`is_due`]: has `now` left the period that contains `last_reset`?
//! - [`next_boundary`]: first instant after `now` at which a new period starts.
//!
//! All period arithmetic happens on local calendar dates in the observer's
//! time zone and is converted back to UTC only at the end, so DST shifts
//! move a boundary's UTC instant but never skip or repeat one.

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc,
    Weekday,
};
use serde::{Deserialize, Serialize};

use crate::counter::ResetFrequency;

/// Week-of-year position. `year_for_week` differs from the calendar year for
/// days in late December or early January that belong to a neighboring year's week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeekOfYear {
    pub year_for_week: i32,
    pub week: u32,
}

/// The observer's calendar: time zone plus week numbering rules.
#[derive(Debug, Clone)]
pub struct ResetCalendar<Tz: TimeZone = Local> {
    tz: Tz,
    first_weekday: Weekday,
    minimum_days_in_first_week: u32,
}

impl ResetCalendar<Local> {
    /// System time zone, weeks starting on Sunday.
    pub fn local() -> Self {
        Self::new(Local, Weekday::Sun)
    }
}

impl<Tz: TimeZone> ResetCalendar<Tz> {
    pub fn new(tz: Tz, first_weekday: Weekday) -> Self {
        Self {
            tz,
            first_weekday,
            minimum_days_in_first_week: 1,
        }
    }

    /// Days of January a week needs to count as week 1 (ISO 8601 uses 4).
    pub fn with_minimum_days_in_first_week(mut self, days: u32) -> Self {
        self.minimum_days_in_first_week = days.clamp(1, 7);
        self
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    pub fn first_weekday(&self) -> Weekday {
        self.first_weekday
    }

    pub fn minimum_days_in_first_week(&self) -> u32 {
        self.minimum_days_in_first_week
    }

    /// Calendar date of `instant` in the observer's zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// First instant of `date`.
    ///
    /// When midnight falls into a DST gap the first existing local time is
    /// used; when it is ambiguous the earlier instant wins.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        let mut probe = midnight;
        for _ in 0..=(24 * 4) {
            match self.tz.from_local_datetime(&probe) {
                LocalResult::Single(dt) => return dt.with_timezone(&Utc),
                LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
                LocalResult::None => probe += Duration::minutes(15),
            }
        }
        // No zone has a day-long gap; fall back to treating midnight as UTC.
        Utc.from_utc_datetime(&midnight)
    }

    /// Most recent `first_weekday` on or before `date`.
    pub fn week_start(&self, date: NaiveDate) -> NaiveDate {
        let offset = (date.weekday().num_days_from_monday() + 7
            - self.first_weekday.num_days_from_monday())
            % 7;
        date - Duration::days(i64::from(offset))
    }

    fn week_one_start(&self, year: i32) -> Option<NaiveDate> {
        let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let start = self.week_start(jan1);
        let days_in_year = 7 - (jan1 - start).num_days();
        if days_in_year >= i64::from(self.minimum_days_in_first_week) {
            Some(start)
        } else {
            Some(start + Duration::days(7))
        }
    }

    /// Week number and year-for-week of `instant`.
    pub fn week_of_year(&self, instant: DateTime<Utc>) -> WeekOfYear {
        let date = self.local_date(instant);
        let start = self.week_start(date);
        let year = date.year();
        for candidate in [year + 1, year, year - 1] {
            if let Some(first) = self.week_one_start(candidate) {
                if first <= start {
                    return WeekOfYear {
                        year_for_week: candidate,
                        week: ((start - first).num_days() / 7 + 1) as u32,
                    };
                }
            }
        }
        WeekOfYear {
            year_for_week: year,
            week: 1,
        }
    }

    /// Start of the period containing `now`.
    ///
    /// `Never` has no periods; `now` itself is returned.
    pub fn period_start(&self, frequency: ResetFrequency, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.local_date(now);
        match frequency {
            ResetFrequency::Daily => self.start_of_day(today),
            ResetFrequency::Weekly => self.start_of_day(self.week_start(today)),
            ResetFrequency::Monthly => today
                .with_day(1)
                .map(|first| self.start_of_day(first))
                .unwrap_or(now),
            ResetFrequency::Never => now,
        }
    }
}

impl Default for ResetCalendar<Local> {
    fn default() -> Self {
        Self::local()
    }
}

/// Whether `now` lies in a different period than `last_reset`.
pub fn is_due<Tz: TimeZone>(
    frequency: ResetFrequency,
    last_reset: DateTime<Utc>,
    now: DateTime<Utc>,
    calendar: &ResetCalendar<Tz>,
) -> bool {
    match frequency {
        ResetFrequency::Never => false,
        ResetFrequency::Daily => calendar.local_date(last_reset) != calendar.local_date(now),
        ResetFrequency::Weekly => calendar.week_of_year(last_reset) != calendar.week_of_year(now),
        ResetFrequency::Monthly => {
            let last = calendar.local_date(last_reset);
            let current = calendar.local_date(now);
            (last.year(), last.month()) != (current.year(), current.month())
        }
    }
}

/// The next period start strictly after `now`, or `None` for `Never`.
pub fn next_boundary<Tz: TimeZone>(
    frequency: ResetFrequency,
    now: DateTime<Utc>,
    calendar: &ResetCalendar<Tz>,
) -> Option<DateTime<Utc>> {
    let today = calendar.local_date(now);
    match frequency {
        ResetFrequency::Never => None,
        ResetFrequency::Daily => Some(calendar.start_of_day(today.succ_opt()?)),
        ResetFrequency::Weekly => {
            let mut day = today.succ_opt()?;
            while day.weekday() != calendar.first_weekday() {
                day = day.succ_opt()?;
            }
            Some(calendar.start_of_day(day))
        }
        ResetFrequency::Monthly => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            Some(calendar.start_of_day(NaiveDate::from_ymd_opt(year, month, 1)?))
        }
    }
}
