// Time helpers shared by the data sources and the pivot engine.
// All calendar math is done in UTC.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

/// Exchange timestamps are milliseconds; candles carry seconds.
pub fn millis_to_secs(ms: i64) -> i64 {
    ms.div_euclid(1000)
}

fn utc_date(time: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(time, 0).map(|dt| dt.date_naive())
}

fn midnight(date: NaiveDate) -> Option<i64> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp())
}

pub fn start_of_utc_day(time: i64) -> Option<i64> {
    midnight(utc_date(time)?)
}

/// Weeks start on Monday 00:00 UTC.
pub fn start_of_utc_week(time: i64) -> Option<i64> {
    let date = utc_date(time)?;
    let since_monday = u64::from(date.weekday().num_days_from_monday());
    let monday = date.checked_sub_days(Days::new(since_monday))?;
    midnight(monday)
}

pub fn start_of_utc_month(time: i64) -> Option<i64> {
    let date = utc_date(time)?;
    midnight(NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?)
}
