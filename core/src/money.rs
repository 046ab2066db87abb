//! A signed, fixed-point monetary amount, plus the currency enum this system
//! understands. Modeled on the teacher's `Amount` newtype (a `Decimal`
//! wrapper with checked arithmetic), generalized to allow negative values
//! since a [`crate::model::Transaction`] amount is signed (positive = charge)
//! and widened from a single-unit-system amount to a currency-tagged one.

use std::{
    fmt::{self, Display},
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The only currencies this system understands. Extending this list also
/// requires extending [`crate::conversion`]'s lookup table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Ars,
}

impl Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Usd => "USD",
            Self::Ars => "ARS",
        };
        f.write_str(s)
    }
}

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "ARS" => Ok(Self::Ars),
            _ => Err(UnknownCurrency(s.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown currency: {0}")]
pub struct UnknownCurrency(pub String);

/// A fixed-point monetary amount with at least two fractional digits of
/// precision, internally a [`Decimal`]. Unlike the teacher's `Amount`, this
/// may be negative: a [`crate::model::Transaction`] amount is signed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        // Statement/transaction amounts carry at least 2 fractional digits;
        // round-half-even at write time so stored values are stable.
        Self(value.round_dp(2))
    }

    #[inline]
    pub fn from_i64_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    #[inline]
    pub fn is_non_negative(&self) -> bool {
        !self.is_negative()
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_mul_rate(self, rate: Decimal) -> Option<Self> {
        self.0.checked_mul(rate).map(Self::new)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Decimal::fmt(&self.0, f)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Self::new(d)
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn rounds_to_two_fractional_digits() {
        let m = Money::new(dec!(10.005));
        assert_eq!(m.as_decimal(), dec!(10.00));
    }

    #[test]
    fn currency_roundtrips_through_display_and_from_str() {
        for c in [Currency::Usd, Currency::Ars] {
            let parsed: Currency = c.to_string().parse().unwrap();
            assert_eq!(c, parsed);
        }
    }

    #[test]
    fn negative_amounts_are_representable() {
        let m = Money::new(dec!(-42.50));
        assert!(m.is_negative());
        assert_eq!(-m, Money::new(dec!(42.50)));
    }
}
