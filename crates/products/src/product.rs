use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, add_quantities, impl_document};

/// One measurement attribute (e.g. `{label: "Largo", unit: "cm", value: 30}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub label: String,
    pub unit: String,
    pub value: f64,
}

/// Input for creating a product. Stock always starts at zero; initial stock is
/// seeded through a ledger movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Amount,
    #[serde(default)]
    pub cost: Amount,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Attribute edits. `None` leaves the field untouched.
///
/// Stock is not editable here: it belongs to the ledger. A cost edit overrides
/// the average cost without posting a movement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Option<Amount>,
    pub cost: Option<Amount>,
    pub measurements: Option<Vec<Measurement>>,
    pub category: Option<String>,
}

/// Catalog product, keyed by SKU.
///
/// `stock_current` and `cost` are only changed through [`Product::add_stock`],
/// [`Product::remove_stock`] and [`Product::set_average_cost`], which the stock
/// ledger drives. Those keep `cost * stock_current` representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: DocumentId,
    pub sku: String,
    pub name: String,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price: Amount,
    cost: Amount,
    stock_current: i64,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(Product, "products", ["sku"]);

impl Product {
    pub fn create(draft: NewProduct, at: DateTime<Utc>) -> DomainResult<Self> {
        let sku = draft.sku.trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if draft.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if draft.price.is_negative() {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if draft.cost.is_negative() {
            return Err(DomainError::validation("cost cannot be negative"));
        }

        Ok(Self {
            id: DocumentId::new(),
            sku,
            name: draft.name.trim().to_string(),
            brand: draft.brand,
            description: draft.description,
            price: draft.price,
            cost: draft.cost,
            stock_current: 0,
            measurements: draft.measurements,
            category: draft.category,
            created_at: at,
            version: 0,
        })
    }

    pub fn cost(&self) -> Amount {
        self.cost
    }

    pub fn stock_current(&self) -> i64 {
        self.stock_current
    }

    /// Value of the units on hand at the current average cost.
    pub fn stock_value(&self) -> DomainResult<Amount> {
        self.cost.times(self.stock_current)
    }

    pub fn apply_changes(&mut self, changes: ProductChanges) -> DomainResult<()> {
        if let Some(name) = changes.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(price) = changes.price {
            if price.is_negative() {
                return Err(DomainError::validation("price cannot be negative"));
            }
            self.price = price;
        }
        if let Some(cost) = changes.cost {
            self.set_average_cost(cost)?;
        }
        if changes.brand.is_some() {
            self.brand = changes.brand;
        }
        if changes.description.is_some() {
            self.description = changes.description;
        }
        if let Some(measurements) = changes.measurements {
            self.measurements = measurements;
        }
        if changes.category.is_some() {
            self.category = changes.category;
        }
        Ok(())
    }

    /// Fails with `InsufficientStock` unless `quantity` units are on hand.
    pub fn ensure_available(&self, quantity: i64) -> DomainResult<()> {
        if self.stock_current < quantity {
            return Err(DomainError::insufficient_stock(
                &self.sku,
                self.stock_current,
                quantity,
            ));
        }
        Ok(())
    }

    pub fn add_stock(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        let stock_current = add_quantities(self.stock_current, quantity)?;
        self.cost.times(stock_current)?;
        self.stock_current = stock_current;
        Ok(())
    }

    /// Decrement stock; leaves the product untouched when it would go negative.
    pub fn remove_stock(&mut self, quantity: i64) -> DomainResult<()> {
        ensure_positive(quantity)?;
        self.ensure_available(quantity)?;
        self.stock_current -= quantity;
        Ok(())
    }

    pub fn set_average_cost(&mut self, cost: Amount) -> DomainResult<()> {
        if cost.is_negative() {
            return Err(DomainError::validation("cost cannot be negative"));
        }
        cost.times(self.stock_current)?;
        self.cost = cost;
        Ok(())
    }
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kardex_core::Document;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn draft(sku: &str) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: "Tornillo hexagonal".to_string(),
            brand: Some("Acme".to_string()),
            description: None,
            price: Amount::new(dec!(1.5)),
            cost: Amount::ZERO,
            measurements: vec![],
            category: None,
        }
    }

    #[test]
    fn create_starts_with_zero_stock_and_trimmed_sku() {
        let product = Product::create(draft("  SKU-100 "), Utc::now()).unwrap();
        assert_eq!(product.sku, "SKU-100");
        assert_eq!(product.stock_current(), 0);
        assert_eq!(product.cost(), Amount::ZERO);
        assert_eq!(Product::UNIQUE_KEYS, &["sku"]);
    }

    #[test]
    fn create_rejects_empty_sku() {
        let err = Product::create(draft("   "), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_negative_price() {
        let mut d = draft("SKU-1");
        d.price = Amount::new(dec!(-1));
        let err = Product::create(d, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn remove_stock_beyond_available_fails_and_keeps_state() {
        let mut product = Product::create(draft("SKU-1"), Utc::now()).unwrap();
        product.add_stock(3).unwrap();

        let err = product.remove_stock(5).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock("SKU-1", 3, 5));
        assert_eq!(product.stock_current(), 3);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut product = Product::create(draft("SKU-1"), Utc::now()).unwrap();
        assert!(matches!(product.add_stock(0), Err(DomainError::Validation(_))));
        assert!(matches!(product.remove_stock(0), Err(DomainError::Validation(_))));
    }

    #[test]
    fn apply_changes_does_not_touch_stock() {
        let mut product = Product::create(draft("SKU-1"), Utc::now()).unwrap();
        product.add_stock(10).unwrap();
        product.set_average_cost(Amount::from(5)).unwrap();

        product
            .apply_changes(ProductChanges {
                name: Some("Tornillo largo".to_string()),
                price: Some(Amount::from(2)),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(product.name, "Tornillo largo");
        assert_eq!(product.price, Amount::from(2));
        assert_eq!(product.stock_current(), 10);
        assert_eq!(product.cost(), Amount::from(5));

        product
            .apply_changes(ProductChanges {
                cost: Some(Amount::new(dec!(4.5))),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(product.cost(), Amount::new(dec!(4.5)));
        assert_eq!(product.stock_current(), 10);
    }

    #[test]
    fn stock_and_cost_survive_serialization() {
        let mut product = Product::create(draft("SKU-1"), Utc::now()).unwrap();
        product.add_stock(4).unwrap();
        product.set_average_cost(Amount::new(dec!(6.25))).unwrap();

        let body = serde_json::to_value(&product).unwrap();
        assert_eq!(body["stock_current"], serde_json::json!(4));
        assert_eq!(body["cost"], serde_json::json!(6.25));

        let back: Product = serde_json::from_value(body).unwrap();
        assert_eq!(back.stock_current(), 4);
        assert_eq!(back.stock_value().unwrap(), Amount::from(25));
    }

    #[test]
    fn stock_past_i64_is_rejected_and_kept() {
        let half = i64::MAX / 2 + 1;
        let mut product = Product::create(draft("SKU-1"), Utc::now()).unwrap();
        product.add_stock(half).unwrap();

        let err = product.add_stock(half).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(product.stock_current(), half);
    }

    #[test]
    fn stock_value_must_stay_representable() {
        let mut product = Product::create(draft("SKU-1"), Utc::now()).unwrap();
        product.add_stock(1_000_000_000).unwrap();

        let huge = Amount::new(dec!(100000000000000000000000));
        let err = product.set_average_cost(huge).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(product.cost(), Amount::ZERO);

        product.set_average_cost(Amount::from(2)).unwrap();
        assert_eq!(product.stock_value().unwrap(), Amount::from(2_000_000_000));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Stock never goes negative whatever sequence of removals is attempted.
        #[test]
        fn stock_never_negative(ops in prop::collection::vec((any::<bool>(), 1i64..50), 1..40)) {
            let mut product = Product::create(draft("SKU-P"), Utc::now()).unwrap();
            for (inbound, qty) in ops {
                if inbound {
                    product.add_stock(qty).unwrap();
                } else {
                    let _ = product.remove_stock(qty);
                }
                prop_assert!(product.stock_current() >= 0);
            }
        }
    }
}
