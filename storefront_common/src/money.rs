use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of minor units (cents, kobo, ...) in one major currency unit.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------       Money          ---------------------------------------------------------
/// A monetary amount, held as an integer number of minor currency units.
///
/// Every price, discount and commission in the system is a `Money`, so that totals add up exactly. The only place
/// fractional values appear is in percentages, which are applied with [`Money::percent`] and rounded once.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

// Operators saturate at the bounds of `i64` instead of wrapping. Use the `checked_*` methods where an overflow must be
// reported.
op!(binary Money, Add, add, saturating_add);
op!(binary Money, Sub, sub, saturating_sub);
op!(inplace Money, AddAssign, add_assign, saturating_add);
op!(inplace Money, SubAssign, sub_assign, saturating_sub);
op!(unary Money, Neg, neg, saturating_neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0.saturating_mul(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_major = MINOR_UNITS_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per_major, abs % per_major)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units.saturating_mul(MINOR_UNITS_PER_MAJOR))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_mul(self, rhs: i64) -> Option<Self> {
        self.0.checked_mul(rhs).map(Self)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// `percent`% of this amount, rounded half away from zero to the nearest minor unit.
    pub fn percent(&self, percent: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let value = (self.0 as f64 * percent / 100.0).round() as i64;
        Self(value)
    }

    /// The amount left after taking `percent`% off.
    pub fn less_percent(&self, percent: f64) -> Self {
        *self - self.percent(percent)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn percentages_round_to_the_nearest_minor_unit() {
        let price = Money::from(1999);
        assert_eq!(price.percent(10.0), Money::from(200));
        assert_eq!(price.less_percent(10.0), Money::from(1799));
        assert_eq!(Money::from(3000).percent(12.5), Money::from(375));
        assert_eq!(Money::from(5).percent(50.0), Money::from(3));
        assert_eq!(Money::from(1000).percent(0.0), Money::zero());
    }

    #[test]
    fn arithmetic() {
        let mut total: Money = [Money::from(150), Money::from(250), Money::from(100)].into_iter().sum();
        assert_eq!(total, Money::from(500));
        total -= Money::from(50);
        total += Money::from(5);
        assert_eq!(total, Money::from(455));
        assert_eq!(total * 2, Money::from(910));
        assert!((-total).is_negative());
    }

    #[test]
    fn overflow_saturates_or_is_reported() {
        let max = Money::from(i64::MAX);
        assert_eq!(max + Money::from(1), max);
        assert_eq!(Money::from(i64::MIN) - Money::from(1), Money::from(i64::MIN));
        assert_eq!(max * 3, max);
        assert_eq!(Money::from(-10) * i64::MAX, Money::from(i64::MIN));
        assert_eq!(-Money::from(i64::MIN), max);
        let mut total = max;
        total += Money::from(10);
        assert_eq!(total, max);
        let sum: Money = [max, max, Money::from(-5)].into_iter().sum();
        assert_eq!(sum, max - Money::from(5));

        assert_eq!(max.checked_add(Money::from(1)), None);
        assert_eq!(Money::from(i64::MIN).checked_sub(Money::from(1)), None);
        assert_eq!(max.checked_mul(2), None);
        assert_eq!(Money::from(250).checked_mul(4), Some(Money::from(1000)));
        assert_eq!(Money::from(250).checked_add(Money::from(50)), Some(Money::from(300)));
    }

    #[test]
    fn display() {
        assert_eq!(Money::from(123_456).to_string(), "1234.56");
        assert_eq!(Money::from(7).to_string(), "0.07");
        assert_eq!(Money::from(-250).to_string(), "-2.50");
        assert_eq!(Money::from_major(12).to_string(), "12.00");
    }

    #[test]
    fn serializes_as_a_bare_integer() {
        let json = serde_json::to_string(&Money::from(4200)).unwrap();
        assert_eq!(json, "4200");
        let m: Money = serde_json::from_str("-15").unwrap();
        assert_eq!(m, Money::from(-15));
    }

    #[test]
    fn conversion_from_u64() {
        assert_eq!(Money::try_from(10u64).unwrap(), Money::from(10));
        assert!(Money::try_from(u64::MAX).is_err());
    }
}
