//! Value objects: equality by value, not identity.

use core::fmt;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: to "modify" one,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Decimal places every stored monetary value is rounded to.
pub const MONEY_SCALE: u32 = 3;

/// Round to 3 decimal places, half away from zero.
pub fn round3(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A monetary amount (price, cost, total, payment).
///
/// Always held rounded to 3 decimal places; every constructor and every
/// arithmetic result goes through [`round3`]. Serializes as a JSON number.
///
/// Arithmetic is checked: a result outside the decimal range is a
/// `Validation` error, never a panic.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Amount(Decimal);

impl ValueObject for Amount {}

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(round3(value))
    }

    pub fn from_f64(value: f64) -> Result<Self, DomainError> {
        Decimal::from_f64(value)
            .map(Self::new)
            .ok_or_else(|| DomainError::validation(format!("amount {value} is not representable")))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Line extension: `self * quantity`, rounded.
    pub fn times(self, quantity: i64) -> DomainResult<Amount> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Amount::new)
            .ok_or_else(|| overflow(format!("{self} x {quantity}")))
    }

    pub fn checked_add(self, rhs: Amount) -> DomainResult<Amount> {
        self.0
            .checked_add(rhs.0)
            .map(Amount::new)
            .ok_or_else(|| overflow(format!("{self} + {rhs}")))
    }

    pub fn checked_sub(self, rhs: Amount) -> DomainResult<Amount> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount::new)
            .ok_or_else(|| overflow(format!("{self} - {rhs}")))
    }

    pub fn try_sum<I>(amounts: I) -> DomainResult<Amount>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, Amount::checked_add)
    }
}

fn overflow(expr: String) -> DomainError {
    DomainError::validation(format!("amount out of range: {expr}"))
}

/// `a + b` for unit quantities; out of `i64` range is a `Validation` error.
pub fn add_quantities(a: i64, b: i64) -> DomainResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::validation(format!("quantity out of range: {a} + {b}")))
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl TryFrom<f64> for Amount {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(DomainError::validation("amount must be a finite number"));
        }
        Amount::from_f64(value)
    }
}

impl From<Amount> for f64 {
    fn from(value: Amount) -> Self {
        value.0.to_f64().unwrap_or_default()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(Amount::new(dec!(1.0005)).value(), dec!(1.001));
        assert_eq!(Amount::new(dec!(1.0004)).value(), dec!(1.000));
        assert_eq!(Amount::new(dec!(-1.0005)).value(), dec!(-1.001));
        assert_eq!(Amount::new(dec!(2.0025)).value(), dec!(2.003));
    }

    #[test]
    fn serializes_as_json_number() {
        let amount = Amount::new(dec!(6.5));
        assert_eq!(serde_json::to_value(amount).unwrap(), serde_json::json!(6.5));

        let parsed: Amount = serde_json::from_value(serde_json::json!(12.34567)).unwrap();
        assert_eq!(parsed.value(), dec!(12.346));
    }

    #[test]
    fn times_rounds_the_extension() {
        let unit = Amount::new(dec!(0.333));
        assert_eq!(unit.times(3).unwrap().value(), dec!(0.999));
        assert_eq!(Amount::from(5).times(10).unwrap(), Amount::from(50));
    }

    #[test]
    fn arithmetic_past_the_decimal_range_is_a_validation_error() {
        let huge = Amount::from_f64(1e25).unwrap();
        assert!(matches!(huge.times(100_000), Err(DomainError::Validation(_))));

        let max = Amount::new(Decimal::MAX);
        assert!(matches!(max.checked_add(Amount::from(1)), Err(DomainError::Validation(_))));
        assert!(matches!(Amount::new(Decimal::MIN).checked_sub(max), Err(DomainError::Validation(_))));
        assert!(Amount::try_sum([max, max]).is_err());
    }

    #[test]
    fn quantity_sums_are_checked() {
        assert_eq!(add_quantities(2, 3).unwrap(), 5);
        let half = i64::MAX / 2 + 1;
        assert!(matches!(add_quantities(half, half), Err(DomainError::Validation(_))));
    }

    #[test]
    fn try_sum_adds_rounded_values() {
        let total = Amount::try_sum([Amount::new(dec!(0.1)), Amount::new(dec!(0.2)), Amount::from(3)]).unwrap();
        assert_eq!(total.value(), dec!(3.3));
        assert_eq!(Amount::try_sum([]).unwrap(), Amount::ZERO);
    }

    #[test]
    fn display_always_shows_three_places() {
        assert_eq!(Amount::from(6).to_string(), "6.000");
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn construction_never_keeps_more_than_three_places(raw in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..8) {
            let amount = Amount::new(Decimal::new(raw, scale));
            prop_assert!(amount.value().scale() <= MONEY_SCALE);
        }
    }
}
