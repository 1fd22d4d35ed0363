use crate::error::Error;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

const DECIMALS: usize = 8;
const SCALE: u64 = 100_000_000;

/// A FLOW amount in the smallest unit, scaled by 10^8 (Cadence `UFix64`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FixedPoint(pub u64);

impl FixedPoint {
    pub const ZERO: FixedPoint = FixedPoint(0);

    // Totals never realistically approach u64::MAX (~184 billion FLOW), so
    // overflow is left unchecked and wraps.
    pub fn wrapping_add(self, other: FixedPoint) -> FixedPoint {
        FixedPoint(self.0.wrapping_add(other.0))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.0 / SCALE, self.0 % SCALE)
    }
}

impl FromStr for FixedPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::decode(format!("invalid fixed-point amount {s:?}"));

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() || frac_part.len() > DECIMALS {
            return Err(invalid());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let integer: u64 = int_part.parse().map_err(|_| invalid())?;
        let fraction: u64 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{frac_part:0<width$}", width = DECIMALS);
            padded.parse().map_err(|_| invalid())?
        };

        integer
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(fraction))
            .map(FixedPoint)
            .ok_or_else(invalid)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
