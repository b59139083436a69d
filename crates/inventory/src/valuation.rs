//! Weighted-average cost.

use rust_decimal::Decimal;

use kardex_core::{Amount, DomainError, DomainResult, add_quantities};

/// Blend the value on hand with an incoming lot.
///
/// `(stock * cost + qty * unit_cost) / (stock + qty)`, rounded to 3 places.
/// Returns `current_cost` untouched when the resulting quantity is not positive.
/// Intermediate values are not rounded; one that leaves the decimal range is
/// a `Validation` error.
pub fn weighted_average_cost(
    current_stock: i64,
    current_cost: Amount,
    incoming_qty: i64,
    incoming_unit_cost: Amount,
) -> DomainResult<Amount> {
    let total_qty = add_quantities(current_stock, incoming_qty)?;
    if total_qty <= 0 {
        return Ok(current_cost);
    }

    current_cost
        .value()
        .checked_mul(Decimal::from(current_stock))
        .zip(incoming_unit_cost.value().checked_mul(Decimal::from(incoming_qty)))
        .and_then(|(current_value, incoming_value)| current_value.checked_add(incoming_value))
        .and_then(|total_value| total_value.checked_div(Decimal::from(total_qty)))
        .map(Amount::new)
        .ok_or_else(|| {
            DomainError::validation(format!(
                "stock value out of range: {current_stock} at {current_cost} plus {incoming_qty} at {incoming_unit_cost}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn two_equal_lots_average_their_costs() {
        let first = weighted_average_cost(0, Amount::ZERO, 10, Amount::from(5)).unwrap();
        assert_eq!(first, Amount::from(5));

        let second = weighted_average_cost(10, first, 10, Amount::from(7)).unwrap();
        assert_eq!(second, Amount::from(6));
    }

    #[test]
    fn result_is_rounded_to_three_places() {
        // (1 * 1 + 2 * 2) / 3 = 1.6666..
        let cost = weighted_average_cost(1, Amount::from(1), 2, Amount::from(2)).unwrap();
        assert_eq!(cost.value(), dec!(1.667));
    }

    #[test]
    fn zero_denominator_keeps_current_cost() {
        let current = Amount::new(dec!(4.321));
        assert_eq!(weighted_average_cost(0, current, 0, Amount::from(9)).unwrap(), current);
    }

    #[test]
    fn out_of_range_inputs_are_validation_errors() {
        let half = i64::MAX / 2 + 1;
        let err = weighted_average_cost(half, Amount::ZERO, half, Amount::ZERO).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let huge = Amount::new(dec!(10000000000000000000000000));
        let err = weighted_average_cost(10, huge, 100_000, huge).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// The first lot sets the cost exactly.
        #[test]
        fn first_lot_sets_cost(cost_in_mils in 0i64..100_000_000, qty in 1i64..100_000, old in 0i64..1_000_000) {
            let unit = Amount::new(Decimal::new(cost_in_mils, 3));
            let stale = Amount::new(Decimal::new(old, 3));
            prop_assert_eq!(weighted_average_cost(0, stale, qty, unit).unwrap(), unit);
        }

        /// The blended cost lies between the two input costs.
        #[test]
        fn average_is_bounded_by_inputs(
            stock in 1i64..10_000,
            qty in 1i64..10_000,
            a in 0i64..1_000_000,
            b in 0i64..1_000_000,
        ) {
            let ca = Amount::new(Decimal::new(a, 3));
            let cb = Amount::new(Decimal::new(b, 3));
            let avg = weighted_average_cost(stock, ca, qty, cb).unwrap();
            prop_assert!(avg >= ca.min(cb));
            prop_assert!(avg <= ca.max(cb));
        }
    }
}
