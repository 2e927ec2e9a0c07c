//! Day offsets and forecast dates.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Spacing of generated forecast dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastCadence {
    /// Calendar quarter ends (Mar 31, Jun 30, Sep 30, Dec 31)
    QuarterEnd,
    /// Fixed number of days
    Days(u32),
}

/// Days from `origin` to `date`, negative when `date` is earlier.
pub fn day_offset(date: NaiveDate, origin: NaiveDate) -> f64 {
    (date - origin).num_days() as f64
}

/// `periods` dates strictly after `last`, spaced by `cadence`.
///
/// Quarter-end cadence counts from the quarter end that closes the quarter of
/// `last`: a series ending on Feb 14 continues on Jun 30, Sep 30 and Dec 31.
/// A series ending on a quarter end continues with the next one.
pub fn future_dates(last: NaiveDate, cadence: ForecastCadence, periods: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(periods);
    let mut cursor = match cadence {
        ForecastCadence::QuarterEnd => quarter_end(last).unwrap_or(last),
        ForecastCadence::Days(_) => last,
    };
    for _ in 0..periods {
        let next = match cadence {
            ForecastCadence::QuarterEnd => next_quarter_end(cursor),
            ForecastCadence::Days(step) => {
                cursor.checked_add_signed(Duration::days(i64::from(step)))
            }
        };
        match next {
            Some(date) => {
                dates.push(date);
                cursor = date;
            }
            None => break,
        }
    }
    dates
}

fn next_quarter_end(after: NaiveDate) -> Option<NaiveDate> {
    let end = quarter_end(after)?;
    if end > after {
        Some(end)
    } else {
        quarter_end(after.succ_opt()?)
    }
}

fn quarter_end(date: NaiveDate) -> Option<NaiveDate> {
    let month = (date.month0() / 3 + 1) * 3;
    let (year, next_month) = if month == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), month + 1)
    };
    NaiveDate::from_ymd_opt(year, next_month, 1)?.pred_opt()
}
