use crate::error::Error;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_timestamp(v: &str) -> Result<DateTime<Utc>, Error> {
    NaiveDateTime::parse_from_str(v.trim(), TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::decode(format!("invalid timestamp {v:?}: {e}")))
}

/// Parses a `YYYY-MM-DD` date as midnight UTC, or returns `default` when empty.
pub fn parse_date(v: Option<&str>, default: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    match v.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => NaiveDate::parse_from_str(v, DATE_FORMAT)
            .map(start_of_day)
            .map_err(|e| Error::config(format!("invalid date {v:?}: {e}"))),
    }
}

pub fn start_of_year(year: i32) -> Result<DateTime<Utc>, Error> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .map(start_of_day)
        .ok_or_else(|| Error::config(format!("invalid year {year}")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}
