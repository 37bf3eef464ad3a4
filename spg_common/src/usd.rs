use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const USD_CURRENCY_CODE: &str = "USD";
pub const USD_CURRENCY_CODE_LOWER: &str = "usd";

//--------------------------------------     UsdAmount       ---------------------------------------------------------
/// A USD amount in integer cents. All monetary arithmetic in the gateway happens in minor units so that
/// line-item subtotals and totals are exact to 2 decimal places.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UsdAmount(i64);

impl Add for UsdAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for UsdAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for UsdAmount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for UsdAmount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for UsdAmount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for UsdAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl PartialEq for UsdAmount {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for UsdAmount {}

impl From<i64> for UsdAmount {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Not a valid USD amount: {0}")]
pub struct MoneyParseError(String);

impl UsdAmount {
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// The amount in cents. This is also the gateway's minor-unit convention, so no further conversion is
    /// needed when submitting a charge.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn whole_dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Converts a floating point dollar figure (as found in JSON request bodies) into cents, rounding to the
    /// nearest cent. NaN, infinities and values outside the representable range are rejected.
    pub fn try_from_dollars_f64(dollars: f64) -> Result<Self, MoneyParseError> {
        if !dollars.is_finite() {
            return Err(MoneyParseError(format!("{dollars}")));
        }
        let cents = (dollars * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return Err(MoneyParseError(format!("{dollars} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }

    pub fn as_dollars_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl FromStr for UsdAmount {
    type Err = MoneyParseError;

    /// Parses a decimal price string such as "123.45", "$90" or "1,050.00" into cents.
    /// At most 2 decimal places are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().trim_start_matches('$').replace(',', "");
        if cleaned.is_empty() {
            return Err(MoneyParseError(s.to_string()));
        }
        let (sign, cleaned) = match cleaned.strip_prefix('-') {
            Some(rest) => (-1, rest),
            None => (1, cleaned.as_str()),
        };
        let (dollars, cents) = match cleaned.split_once('.') {
            Some((d, c)) => (d, c),
            None => (cleaned, ""),
        };
        if cents.len() > 2 || !cents.chars().all(|c| c.is_ascii_digit()) {
            return Err(MoneyParseError(s.to_string()));
        }
        let dollars = if dollars.is_empty() {
            0
        } else {
            dollars.parse::<i64>().map_err(|_| MoneyParseError(s.to_string()))?
        };
        let mut frac = cents.parse::<i64>().unwrap_or_default();
        if cents.len() == 1 {
            frac *= 10;
        }
        Ok(Self(sign * (dollars * 100 + frac)))
    }
}

impl Display for UsdAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}
