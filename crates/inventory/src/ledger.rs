//! Pure ledger posting.
//!
//! `post` is the decision step of the stock ledger: given the product as read and
//! a movement request, it returns the updated product and the ledger row to
//! append, or the business error. Persisting both, and serializing concurrent
//! posts against the same SKU, is the caller's job.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use kardex_core::{DocumentId, DomainError, DomainResult, add_quantities};
use kardex_products::Product;

use crate::movement::{Direction, MovementRequest, StockMovement};
use crate::valuation::weighted_average_cost;

/// Outcome of posting one movement.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub product: Product,
    pub movement: StockMovement,
}

/// Apply `request` to `product`.
///
/// Inbound movements with a lot cost revalue the product (weighted average)
/// before stock is added. The movement records the lot's own cost when one is
/// given, otherwise the product's average cost at posting time.
pub fn post(product: &Product, request: &MovementRequest, at: DateTime<Utc>) -> DomainResult<Posting> {
    if request.sku != product.sku {
        return Err(DomainError::validation(format!(
            "movement for {} posted against product {}",
            request.sku, product.sku
        )));
    }
    if request.quantity <= 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    if let Some(cost) = request.unit_cost {
        if cost.is_negative() {
            return Err(DomainError::validation("unit cost cannot be negative"));
        }
    }

    let direction = request.resolved_direction()?;
    let mut updated = product.clone();

    match direction {
        Direction::Inbound => {
            if let Some(lot_cost) = request.unit_cost {
                let cost = weighted_average_cost(
                    updated.stock_current(),
                    updated.cost(),
                    request.quantity,
                    lot_cost,
                )?;
                updated.set_average_cost(cost)?;
            }
            updated.add_stock(request.quantity)?;
        }
        Direction::Outbound => updated.remove_stock(request.quantity)?,
    }

    let movement = StockMovement {
        id: DocumentId::new(),
        product_sku: product.sku.clone(),
        quantity: request.quantity,
        movement_type: request.movement_type,
        direction,
        warehouse_id: request.warehouse_id.clone(),
        target_warehouse_id: request.target_warehouse_id.clone(),
        unit_cost: request.unit_cost.unwrap_or(product.cost()),
        reference_document: request.reference_document.clone(),
        date: at,
        notes: request.notes.clone(),
        responsible: request.responsible.clone(),
        version: 0,
    };

    Ok(Posting {
        product: updated,
        movement,
    })
}

/// Total outbound quantity per SKU, in SKU order.
pub fn aggregate_demand<'a, I>(lines: I) -> DomainResult<BTreeMap<String, i64>>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut demand: BTreeMap<String, i64> = BTreeMap::new();
    for (sku, qty) in lines {
        let total = demand.entry(sku.to_string()).or_insert(0);
        *total = add_quantities(*total, qty)?;
    }
    Ok(demand)
}

/// Check every SKU's demand against stock before anything is written.
///
/// Reports the first SKU (in SKU order) that is missing or short.
pub fn check_availability(
    demand: &BTreeMap<String, i64>,
    products: &HashMap<String, Product>,
) -> DomainResult<()> {
    for (sku, required) in demand {
        let product = products
            .get(sku)
            .ok_or_else(|| DomainError::not_found("product", sku))?;
        product.ensure_available(*required)?;
    }
    Ok(())
}

/// Net stock change described by a set of movements.
pub fn net_quantity<'a, I>(movements: I) -> DomainResult<i64>
where
    I: IntoIterator<Item = &'a StockMovement>,
{
    movements
        .into_iter()
        .try_fold(0i64, |net, m| add_quantities(net, m.signed_quantity()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MovementType;
    use kardex_core::Amount;
    use kardex_products::NewProduct;
    use proptest::prelude::*;

    fn product(sku: &str) -> Product {
        Product::create(
            NewProduct {
                sku: sku.to_string(),
                name: format!("Product {sku}"),
                brand: None,
                description: None,
                price: Amount::from(10),
                cost: Amount::ZERO,
                measurements: vec![],
                category: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn weighted_average_scenario() {
        let p = product("SKU-100");

        let first = post(
            &p,
            &MovementRequest::new("SKU-100", 10, MovementType::In).unit_cost(Amount::from(5)),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(first.product.stock_current(), 10);
        assert_eq!(first.product.cost(), Amount::from(5));

        let second = post(
            &first.product,
            &MovementRequest::new("SKU-100", 10, MovementType::In).unit_cost(Amount::from(7)),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(second.product.stock_current(), 20);
        assert_eq!(second.product.cost(), Amount::from(6));
        // Lot cost, not the blended average.
        assert_eq!(second.movement.unit_cost, Amount::from(7));

        let third = post(
            &second.product,
            &MovementRequest::new("SKU-100", 15, MovementType::Out),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(third.product.stock_current(), 5);
        assert_eq!(third.product.cost(), Amount::from(6));
        assert_eq!(third.movement.unit_cost, Amount::from(6));
        assert_eq!(third.movement.direction, Direction::Outbound);
    }

    #[test]
    fn outbound_beyond_stock_is_insufficient_stock() {
        let p = product("SKU-1");
        let err = post(&p, &MovementRequest::new("SKU-1", 1, MovementType::LossTheft), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("SKU-1", 0, 1));
    }

    #[test]
    fn inbound_without_cost_keeps_average() {
        let mut p = product("SKU-1");
        p.set_average_cost(Amount::from(3)).unwrap();
        let posting = post(&p, &MovementRequest::new("SKU-1", 2, MovementType::TransferIn), Utc::now())
            .unwrap();
        assert_eq!(posting.product.cost(), Amount::from(3));
        assert_eq!(posting.movement.unit_cost, Amount::from(3));
    }

    #[test]
    fn mismatched_sku_is_rejected() {
        let p = product("SKU-1");
        let err = post(&p, &MovementRequest::new("SKU-2", 1, MovementType::In), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn availability_reports_the_short_sku() {
        let mut a = product("SKU-A");
        a.add_stock(10).unwrap();
        let mut b = product("SKU-B");
        b.add_stock(2).unwrap();
        let products: HashMap<_, _> = [a, b].into_iter().map(|p| (p.sku.clone(), p)).collect();

        let demand = aggregate_demand([("SKU-A", 5), ("SKU-B", 5)]).unwrap();
        let err = check_availability(&demand, &products).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("SKU-B", 2, 5));
    }

    #[test]
    fn demand_sums_repeated_skus() {
        let demand = aggregate_demand([("SKU-A", 3), ("SKU-B", 1), ("SKU-A", 4)]).unwrap();
        assert_eq!(demand.get("SKU-A"), Some(&7));
        assert_eq!(demand.len(), 2);
    }

    #[test]
    fn demand_past_i64_is_a_validation_error() {
        let half = i64::MAX / 2 + 1;
        let err = aggregate_demand([("SKU-A", half), ("SKU-A", half)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn second_huge_inbound_is_rejected_without_panicking() {
        let half = i64::MAX / 2 + 1;
        let first = post(&product("SKU-1"), &MovementRequest::new("SKU-1", half, MovementType::In), Utc::now())
            .unwrap();
        let err = post(&first.product, &MovementRequest::new("SKU-1", half, MovementType::In), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let lot = MovementRequest::new("SKU-1", half, MovementType::In).unit_cost(Amount::from(3));
        let err = post(&first.product, &lot, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// stock == Σ inbound − Σ outbound over accepted postings; rejected
        /// postings leave the product unchanged.
        #[test]
        fn stock_is_conserved(ops in prop::collection::vec((any::<bool>(), 1i64..40, 0i64..20_000), 1..60)) {
            let mut current = product("SKU-P");
            let mut ledger: Vec<StockMovement> = Vec::new();

            for (inbound, qty, cost) in ops {
                let request = if inbound {
                    MovementRequest::new("SKU-P", qty, MovementType::In)
                        .unit_cost(Amount::new(rust_decimal::Decimal::new(cost, 3)))
                } else {
                    MovementRequest::new("SKU-P", qty, MovementType::Out)
                };

                match post(&current, &request, Utc::now()) {
                    Ok(posting) => {
                        current = posting.product;
                        ledger.push(posting.movement);
                    }
                    Err(DomainError::InsufficientStock { available, required, .. }) => {
                        prop_assert_eq!(available, current.stock_current());
                        prop_assert!(required > available);
                    }
                    Err(other) => return Err(TestCaseError::fail(format!("unexpected {other:?}"))),
                }

                prop_assert!(current.stock_current() >= 0);
                prop_assert_eq!(current.stock_current(), net_quantity(&ledger).unwrap());
            }
        }
    }
}
