//! Reconciliation queries: they detect inconsistencies left by interrupted
//! workflows but never repair anything.

use serde::Serialize;

use kardex_core::DomainError;
use kardex_inventory::{StockMovement, net_quantity};
use kardex_purchasing::PurchaseInvoice;
use kardex_sales::SalesInvoice;

use crate::error::ServiceResult;
use crate::ledger::LedgerEngine;
use crate::store::{DocumentStore, Documents, Query};

/// Product stock next to what its kardex adds up to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockAudit {
    pub sku: String,
    pub stock_current: i64,
    pub ledger_quantity: i64,
    pub difference: i64,
    pub consistent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentKind {
    Reception,
    Dispatch,
}

/// An invoice whose guide is linked but whose status was never flipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleFulfillment {
    pub kind: FulfillmentKind,
    pub invoice_number: String,
    pub guide_number: String,
}

pub struct AuditService<S> {
    docs: Documents<S>,
    ledger: LedgerEngine<S>,
}

impl<S: Clone> Clone for AuditService<S> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: DocumentStore> AuditService<S> {
    pub fn new(docs: Documents<S>, ledger: LedgerEngine<S>) -> Self {
        Self { docs, ledger }
    }

    pub async fn audit_stock(&self, sku: &str) -> ServiceResult<StockAudit> {
        let product = self.ledger.product(sku).await?;
        let movements: Vec<StockMovement> = self
            .docs
            .find_all(Query::new().eq("product_sku", sku))
            .await?;
        let ledger_quantity = net_quantity(&movements)?;
        let stock_current = product.stock_current();
        let difference = stock_current
            .checked_sub(ledger_quantity)
            .ok_or_else(|| DomainError::validation(format!("ledger quantity of {sku} out of range")))?;
        Ok(StockAudit {
            sku: product.sku,
            stock_current,
            ledger_quantity,
            difference,
            consistent: difference == 0,
        })
    }

    pub async fn stale_fulfillments(&self) -> ServiceResult<Vec<StaleFulfillment>> {
        let mut stale = Vec::new();

        let purchases: Vec<PurchaseInvoice> = self
            .docs
            .find_all(Query::new().eq("reception_status", "NOT_RECEIVED").sort_asc("invoice_number"))
            .await?;
        stale.extend(purchases.iter().filter(|i| i.is_reception_stale()).filter_map(|i| {
            Some(StaleFulfillment {
                kind: FulfillmentKind::Reception,
                invoice_number: i.invoice_number.clone(),
                guide_number: i.guide_number()?.to_string(),
            })
        }));

        let sales: Vec<SalesInvoice> = self
            .docs
            .find_all(Query::new().eq("dispatch_status", "NOT_DISPATCHED").sort_asc("invoice_number"))
            .await?;
        stale.extend(sales.iter().filter(|i| i.is_dispatch_stale()).filter_map(|i| {
            Some(StaleFulfillment {
                kind: FulfillmentKind::Dispatch,
                invoice_number: i.invoice_number.clone(),
                guide_number: i.guide_number()?.to_string(),
            })
        }));

        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::KeyedLocks;
    use crate::store::InMemoryDocumentStore;
    use chrono::Utc;
    use kardex_core::Amount;
    use kardex_inventory::{MovementRequest, MovementType};
    use kardex_products::{NewProduct, Product};
    use kardex_purchasing::{OrderItem, PurchaseOrder};
    use std::sync::Arc;

    type Audit = AuditService<Arc<InMemoryDocumentStore>>;

    fn audit() -> (Audit, Documents<Arc<InMemoryDocumentStore>>) {
        let docs = Documents::new(Arc::new(InMemoryDocumentStore::new()));
        let ledger = LedgerEngine::new(docs.clone(), Arc::new(KeyedLocks::new()));
        (AuditService::new(docs.clone(), ledger), docs)
    }

    #[tokio::test]
    async fn drift_between_product_and_kardex_is_reported() {
        let (audit, docs) = audit();
        let mut product = Product::create(
            NewProduct {
                sku: "A".to_string(),
                name: "Arena".to_string(),
                brand: None,
                description: None,
                price: Amount::from(3),
                cost: Amount::ZERO,
                measurements: Vec::new(),
                category: None,
            },
            Utc::now(),
        )
        .unwrap();
        docs.insert(&mut product).await.unwrap();
        audit
            .ledger
            .apply_movement(MovementRequest::new("A", 5, MovementType::In))
            .await
            .unwrap();
        assert!(audit.audit_stock("A").await.unwrap().consistent);

        // Product saved, movement lost.
        let mut product = audit.ledger.product("A").await.unwrap();
        product.add_stock(2).unwrap();
        docs.save(&mut product).await.unwrap();

        let report = audit.audit_stock("A").await.unwrap();
        assert_eq!(report.ledger_quantity, 5);
        assert_eq!(report.difference, 2);
        assert!(!report.consistent);
    }

    #[tokio::test]
    async fn claimed_but_unfinished_reception_is_listed() {
        let (audit, docs) = audit();
        let order = PurchaseOrder::create(
            "OC24-0001",
            "Proveedor",
            vec![OrderItem {
                product_sku: "A".to_string(),
                quantity: 1,
                unit_cost: Amount::from(1),
            }],
            None,
            Utc::now(),
        )
        .unwrap();
        let mut done = PurchaseInvoice::from_order(&order, "FC24-0001", Utc::now()).unwrap();
        done.link_guide("GR24-0001").unwrap();
        done.mark_received().unwrap();
        docs.insert(&mut done).await.unwrap();

        let other = PurchaseOrder::create("OC24-0002", "Proveedor", order.items.clone(), None, Utc::now()).unwrap();
        let mut stuck = PurchaseInvoice::from_order(&other, "FC24-0002", Utc::now()).unwrap();
        stuck.link_guide("GR24-0002").unwrap();
        docs.insert(&mut stuck).await.unwrap();

        let stale = audit.stale_fulfillments().await.unwrap();
        assert_eq!(
            stale,
            vec![StaleFulfillment {
                kind: FulfillmentKind::Reception,
                invoice_number: "FC24-0002".to_string(),
                guide_number: "GR24-0002".to_string(),
            }]
        );
    }
}
