use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// A reporting window over calendar days.
///
/// The variant is the window's classification: aligned variants are served
/// from pre-aggregated buckets, `Range` windows from daily buckets or a
/// direct entry scan. `Range` ends are exclusive.
pub enum TimeWindow {
    AllTime,
    Year { year: i32 },
    Month { year: i32, month: u32 },
    Range { start: NaiveDate, end: NaiveDate },
}

impl TimeWindow {
    pub fn year(year: i32) -> Self {
        TimeWindow::Year { year }
    }

    pub fn month(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::InvalidMonth(month));
        }
        Ok(TimeWindow::Month { year, month })
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end <= start {
            return Err(LedgerError::InvalidWindow);
        }
        Ok(TimeWindow::Range { start, end })
    }

    /// The `days`-day window ending on `reference` (inclusive).
    pub fn last_days(reference: NaiveDate, days: u32) -> Self {
        let days = days.max(1);
        TimeWindow::Range {
            start: reference - Duration::days(days as i64 - 1),
            end: reference + Duration::days(1),
        }
    }

    pub fn single_day(date: NaiveDate) -> Self {
        TimeWindow::Range {
            start: date,
            end: date + Duration::days(1),
        }
    }

    /// The Monday-to-date week containing `reference`.
    pub fn this_week(reference: NaiveDate) -> Self {
        let monday = reference
            - Duration::days(reference.weekday().num_days_from_monday() as i64);
        TimeWindow::Range {
            start: monday,
            end: reference + Duration::days(1),
        }
    }

    /// Canonicalizes ranges that exactly cover one month or one year, so the
    /// classification is a property of the window value itself.
    pub fn normalized(self) -> Self {
        if let TimeWindow::Range { start, end } = self {
            if start.day() == 1 && end.day() == 1 {
                if end == next_month(start) {
                    return TimeWindow::Month {
                        year: start.year(),
                        month: start.month(),
                    };
                }
                if start.month() == 1
                    && end.month() == 1
                    && end.year() == start.year() + 1
                {
                    return TimeWindow::Year { year: start.year() };
                }
            }
        }
        self
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            TimeWindow::AllTime => true,
            TimeWindow::Year { year } => date.year() == year,
            TimeWindow::Month { year, month } => date.year() == year && date.month() == month,
            TimeWindow::Range { start, end } => date >= start && date < end,
        }
    }

    /// Inclusive start / exclusive end bounds for the entry-scan path.
    pub fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match *self {
            TimeWindow::AllTime => (None, None),
            TimeWindow::Year { year } => (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year + 1, 1, 1),
            ),
            TimeWindow::Month { year, month } => {
                let start = NaiveDate::from_ymd_opt(year, month, 1);
                (start, start.map(next_month))
            }
            TimeWindow::Range { start, end } => (Some(start), Some(end)),
        }
    }
}

pub(crate) fn next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is always valid")
}
