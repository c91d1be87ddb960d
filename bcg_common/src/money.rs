use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const STORE_CURRENCY_CODE: &str = "INR";
pub const STORE_CURRENCY_CODE_LOWER: &str = "inr";

//--------------------------------------       Money         ---------------------------------------------------------

/// A fixed-point monetary amount with two implied decimal places, stored as integer cents (paise).
///
/// All arithmetic that can produce fractional cents (percentages, proration ratios) goes through
/// [`Decimal`] internally and is quantized back to cents with round-half-up, so repeated
/// computations over the same inputs always land on the same cent.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
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
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<Decimal> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let quantized = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        (quantized * Decimal::ONE_HUNDRED)
            .to_i64()
            .map(Self)
            .ok_or_else(|| MoneyConversionError(format!("{value} is out of range")))
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        Self::try_from(value)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}₹{}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// The plain `"123.45"` rendering that payment gateways expect for amount fields.
    pub fn to_amount_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", cents / 100, cents % 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// `self × bps / 10_000`, rounded half-up to the cent. Percentages are carried as basis
    /// points (2000 bps = 20.00%) so that they stay exact end to end.
    pub fn percent_bps(&self, bps: i64) -> Money {
        let share = self.to_decimal() * Decimal::new(bps, 0) / Decimal::new(10_000, 0);
        Self(quantize_to_cents(share))
    }

    /// The proportional share `self × numerator / denominator`, rounded half-up to the cent.
    /// The denominator must be positive; callers guard against empty or zero-value subtotals.
    pub fn prorate(&self, numerator: Money, denominator: Money) -> Money {
        let share = self.to_decimal() * numerator.to_decimal() / denominator.to_decimal();
        Self(quantize_to_cents(share))
    }
}

/// Quantizes to 2 decimal places (round-half-up) and returns integer cents. Saturates at the
/// i64 range boundary, which is far outside any representable order amount.
fn quantize_to_cents(value: Decimal) -> i64 {
    let quantized = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (quantized * Decimal::ONE_HUNDRED).to_i64().unwrap_or(if value.is_sign_negative() { i64::MIN } else { i64::MAX })
}
