use super::datetime_utils::{parse_date, start_of_year};
use crate::error::Error;
use chrono::{DateTime, Utc};

/// A payout boundary: when it settled and the transaction that settled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epoch {
    pub timestamp: DateTime<Utc>,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Inclusive,
    Exclusive,
}

/// Selects epochs by timestamp. Explicit `--start`/`--end` ranges include both
/// ends; `--year` ranges exclude the following Jan 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub end_bound: RangeEnd,
}

impl DateRange {
    pub fn inclusive(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            end_bound: RangeEnd::Inclusive,
        }
    }

    pub fn year(year: i32) -> Result<Self, Error> {
        let next = year
            .checked_add(1)
            .ok_or_else(|| Error::config(format!("invalid year {year}")))?;
        Ok(Self {
            start: start_of_year(year)?,
            end: start_of_year(next)?,
            end_bound: RangeEnd::Exclusive,
        })
    }

    /// Builds the range from CLI options. A year, when given, overrides both dates.
    /// Year 0 means no year.
    pub fn resolve(
        year: Option<i32>,
        start: Option<&str>,
        end: Option<&str>,
        default_start: DateTime<Utc>,
        default_end: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let start = parse_date(start, default_start)?;
        let end = parse_date(end, default_end)?;
        match year.filter(|&y| y != 0) {
            Some(year) => Self::year(year),
            None => Ok(Self::inclusive(start, end)),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        let below_end = match self.end_bound {
            RangeEnd::Inclusive => ts <= self.end,
            RangeEnd::Exclusive => ts < self.end,
        };
        self.start <= ts && below_end
    }
}

pub fn sort_epochs(epochs: &mut [Epoch]) {
    epochs.sort_by_key(|e| e.timestamp);
}

pub fn filter_epochs<'a>(epochs: &'a [Epoch], range: &DateRange) -> Vec<&'a Epoch> {
    epochs.iter().filter(|e| range.contains(e.timestamp)).collect()
}
