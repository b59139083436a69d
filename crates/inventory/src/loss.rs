use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DomainResult, add_quantities};

use crate::movement::StockMovement;

/// Totals over a set of loss movements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossSummary {
    pub total_quantity: i64,
    pub total_cost: Amount,
    pub total_movements: usize,
}

impl LossSummary {
    /// Non-loss movements are ignored.
    pub fn from_movements<'a, I>(movements: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = &'a StockMovement>,
    {
        movements
            .into_iter()
            .filter(|m| m.movement_type.is_loss())
            .try_fold(Self::default(), |acc, m| -> DomainResult<Self> {
                Ok(Self {
                    total_quantity: add_quantities(acc.total_quantity, m.quantity)?,
                    total_cost: acc.total_cost.checked_add(m.total_cost()?)?,
                    total_movements: acc.total_movements + 1,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{Direction, MovementType};
    use chrono::Utc;
    use kardex_core::DocumentId;

    fn movement(movement_type: MovementType, quantity: i64, cost: i64) -> StockMovement {
        StockMovement {
            id: DocumentId::new(),
            product_sku: "SKU-1".into(),
            quantity,
            movement_type,
            direction: Direction::Outbound,
            warehouse_id: None,
            target_warehouse_id: None,
            unit_cost: Amount::from(cost),
            reference_document: None,
            date: Utc::now(),
            notes: None,
            responsible: None,
            version: 0,
        }
    }

    #[test]
    fn summary_counts_only_losses() {
        let movements = vec![
            movement(MovementType::LossDamaged, 2, 5),
            movement(MovementType::LossExpired, 3, 1),
            movement(MovementType::Out, 10, 5),
        ];
        let summary = LossSummary::from_movements(&movements).unwrap();
        assert_eq!(summary.total_quantity, 5);
        assert_eq!(summary.total_cost, Amount::from(13));
        assert_eq!(summary.total_movements, 2);
    }
}
