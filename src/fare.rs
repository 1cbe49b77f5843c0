//! Rental rate types and the fare formula.
//!
//! The fare of an ended rental is a pure function of the rate type, the rate
//! unit captured when the rental was created, and the start and end
//! timestamps. Every read path recomputes it with [`compute_fare`], so the
//! stored value can always be checked against the formula.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::RentalId;

const MILLIS_PER_MINUTE: u64 = 60_000;
const MILLIS_PER_DAY: u64 = 24 * 3_600_000;

/// Unit a rental is billed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum RateType {
    /// Billed per minute, pro rata.
    Minutes,
    /// Billed per day, pro rata by the hour.
    Days,
}

impl RateType {
    /// Canonical upper-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minutes => "MINUTES",
            Self::Days => "DAYS",
        }
    }
}

impl fmt::Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateType {
    type Err = Error;

    /// Case-insensitive parse of `MINUTES` or `DAYS`.
    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case(Self::Minutes.as_str()) {
            Ok(Self::Minutes)
        } else if trimmed.eq_ignore_ascii_case(Self::Days.as_str()) {
            Ok(Self::Days)
        } else {
            Err(Error::InvalidRateType(value.to_string()))
        }
    }
}

impl TryFrom<&str> for RateType {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

/// Absolute elapsed time between two instants, in milliseconds.
///
/// The order of the arguments does not matter; a clock that observed `end`
/// before `start` still yields a non-negative duration.
pub fn elapsed_millis(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    end.signed_duration_since(start)
        .num_milliseconds()
        .unsigned_abs()
}

/// Computes the fare owed for a rental.
///
/// `MINUTES`: `minutes * rate_unit`. `DAYS`: `(hours / 24) * rate_unit`.
/// The product is taken before the single division, so any fare that is
/// exactly representable comes out exact. `rental` only labels the overflow
/// error.
pub fn compute_fare(
    rental: RentalId,
    rate_type: RateType,
    rate_unit: Decimal,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Decimal> {
    let overflow = || Error::FareOverflow { rental };
    let millis = Decimal::from(elapsed_millis(start, end));
    let per_unit = match rate_type {
        RateType::Minutes => MILLIS_PER_MINUTE,
        RateType::Days => MILLIS_PER_DAY,
    };

    millis
        .checked_mul(rate_unit)
        .and_then(|product| product.checked_div(Decimal::from(per_unit)))
        .ok_or_else(overflow)
}
