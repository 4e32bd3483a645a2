//! Credit amounts.
//!
//! A credit is stored as an integer count of hundredths so fractional prices
//! such as 1.5 credits are exact and balances never drift. One credit is worth
//! one unit of the operating currency, so a gateway amount in minor currency
//! units maps directly onto hundredths of a credit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(i64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Credits(hundredths)
    }

    pub const fn from_whole(credits: i64) -> Self {
        Credits(credits * 100)
    }

    /// Converts a decimal credit value, rounding to the nearest hundredth.
    ///
    /// Returns `None` for NaN, infinities and negative values.
    pub fn from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let hundredths = (value * 100.0).round();
        if hundredths > i64::MAX as f64 {
            return None;
        }
        Some(Credits(hundredths as i64))
    }

    /// Credits bought by a payment of `amount` minor currency units.
    pub fn from_minor_units(amount: u64) -> Option<Self> {
        i64::try_from(amount).ok().map(Credits)
    }

    /// Minor currency units needed to buy this many credits.
    pub fn to_minor_units(self) -> u64 {
        self.0.max(0) as u64
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, other: Credits) -> Option<Credits> {
        self.0.checked_sub(other.0).map(Credits)
    }

    pub fn checked_add(self, other: Credits) -> Option<Credits> {
        self.0.checked_add(other.0).map(Credits)
    }
}

impl Add for Credits {
    type Output = Credits;

    fn add(self, rhs: Credits) -> Credits {
        Credits(self.0 + rhs.0)
    }
}

impl Sub for Credits {
    type Output = Credits;

    fn sub(self, rhs: Credits) -> Credits {
        Credits(self.0 - rhs.0)
    }
}

impl fmt::Display for Credits {
    /// Shortest exact form: `1.5`, `0.25`, `200`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = (self.0 / 100).abs();
        let frac = (self.0 % 100).abs();
        match frac {
            0 => write!(f, "{}{}", sign, whole),
            f_ if f_ % 10 == 0 => write!(f, "{}{}.{}", sign, whole, f_ / 10),
            f_ => write!(f, "{}{}.{:02}", sign, whole, f_),
        }
    }
}
