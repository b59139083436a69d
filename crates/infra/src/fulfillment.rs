//! Fulfillment Guide Generator.
//!
//! A fulfillment step (reception, dispatch, transfer) is recorded as one
//! COMPLETED [`DeliveryGuide`] plus one movement per line, each movement
//! carrying the guide number as its reference. The guide number is the
//! idempotency key: running the same step again with the same number reuses
//! the guide and posts only the movements that are missing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use kardex_core::{Amount, DomainError};
use kardex_inventory::{DeliveryGuide, GuideItem, GuideType, MovementRequest, MovementType, StockMovement};
use kardex_purchasing::OrderItem;
use kardex_sales::SalesLine;

use crate::error::ServiceResult;
use crate::ledger::LedgerEngine;
use crate::store::{DocumentStore, Documents, Page, Pagination, Query};

/// A workflow document together with the guide and movements it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fulfillment<D> {
    pub document: D,
    pub guide: DeliveryGuide,
    /// Movements posted by this call. Empty when a retry found them all in place.
    pub movements: Vec<StockMovement>,
}

/// One line to move. `lot_cost` is the purchase cost of incoming goods; lines
/// without one are valued at the product's average cost.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideLine {
    pub sku: String,
    pub quantity: i64,
    pub lot_cost: Option<Amount>,
}

impl From<&OrderItem> for GuideLine {
    fn from(item: &OrderItem) -> Self {
        Self {
            sku: item.product_sku.clone(),
            quantity: item.quantity,
            lot_cost: Some(item.unit_cost),
        }
    }
}

impl From<&SalesLine> for GuideLine {
    fn from(line: &SalesLine) -> Self {
        Self {
            sku: line.product_sku.clone(),
            quantity: line.quantity,
            lot_cost: None,
        }
    }
}

/// Everything needed to build a guide and its movements, except the number.
#[derive(Debug, Clone, PartialEq)]
pub struct GuidePlan {
    pub guide_type: GuideType,
    pub movement_type: MovementType,
    pub lines: Vec<GuideLine>,
    pub invoice_number: Option<String>,
    pub order_number: Option<String>,
    /// Supplier, customer or warehouse name.
    pub target: Option<String>,
    pub delivery_address: Option<String>,
    pub warehouse: Option<String>,
    pub target_warehouse: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

impl GuidePlan {
    pub fn new(guide_type: GuideType, movement_type: MovementType, lines: Vec<GuideLine>) -> Self {
        Self {
            guide_type,
            movement_type,
            lines,
            invoice_number: None,
            order_number: None,
            target: None,
            delivery_address: None,
            warehouse: None,
            target_warehouse: None,
            notes: None,
            created_by: None,
        }
    }

    pub fn skus(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.sku.clone()).collect()
    }

    /// Ledger requests for every line, referencing `guide_number` when known.
    pub fn requests(&self, guide_number: Option<&str>) -> Vec<MovementRequest> {
        self.lines
            .iter()
            .map(|line| {
                let mut request = MovementRequest::new(&line.sku, line.quantity, self.movement_type)
                    .responsible(self.created_by.clone());
                if let Some(cost) = line.lot_cost {
                    request = request.unit_cost(cost);
                }
                if let Some(number) = guide_number {
                    request = request.reference(number);
                }
                request.warehouse_id = self.warehouse.clone();
                request.target_warehouse_id = self.target_warehouse.clone();
                request.notes = self.notes.clone();
                request
            })
            .collect()
    }
}

pub struct GuideGenerator<S> {
    docs: Documents<S>,
    ledger: LedgerEngine<S>,
}

impl<S: Clone> Clone for GuideGenerator<S> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: DocumentStore> GuideGenerator<S> {
    pub fn new(docs: Documents<S>, ledger: LedgerEngine<S>) -> Self {
        Self { docs, ledger }
    }

    pub async fn guide(&self, guide_number: &str) -> ServiceResult<DeliveryGuide> {
        self.docs
            .find_by::<DeliveryGuide>("guide_number", guide_number)
            .await?
            .ok_or_else(|| DomainError::not_found("delivery guide", guide_number).into())
    }

    pub async fn list_guides(&self, pagination: Pagination) -> ServiceResult<Page<DeliveryGuide>> {
        let query = Query::new().sort_desc("created_date").paginate(pagination);
        Ok(self.docs.find(&query).await?)
    }

    /// Guide created for a direct order reception, if any.
    pub(crate) async fn for_order(&self, order_number: &str) -> ServiceResult<Option<DeliveryGuide>> {
        Ok(self.docs.find_by("order_number", order_number).await?)
    }

    /// Build and store the guide for `plan`, snapshotting each product's name
    /// and cost now. A guide already stored under `guide_number` is returned
    /// as is.
    pub async fn create_guide(
        &self,
        guide_number: &str,
        plan: &GuidePlan,
        at: DateTime<Utc>,
    ) -> ServiceResult<DeliveryGuide> {
        if let Some(existing) = self
            .docs
            .find_by::<DeliveryGuide>("guide_number", guide_number)
            .await?
        {
            warn!(guide_number, "guide already recorded, reusing it");
            return Ok(existing);
        }

        let mut items = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let product = self.ledger.product(&line.sku).await?;
            items.push(GuideItem {
                sku: product.sku.clone(),
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_cost: line.lot_cost.unwrap_or(product.cost()),
            });
        }

        let mut guide = DeliveryGuide::completed(guide_number, plan.guide_type, items, at)?;
        guide.invoice_number = plan.invoice_number.clone();
        guide.order_number = plan.order_number.clone();
        guide.target = plan.target.clone();
        guide.delivery_address = plan.delivery_address.clone();
        guide.notes = plan.notes.clone();
        guide.created_by = plan.created_by.clone();
        self.docs.insert(&mut guide).await?;
        Ok(guide)
    }

    /// Record the guide and post every movement of `plan` not yet in the
    /// ledger under `guide_number`.
    ///
    /// Callers hold the SKU locks of the plan.
    pub(crate) async fn complete(
        &self,
        guide_number: &str,
        plan: &GuidePlan,
        at: DateTime<Utc>,
    ) -> ServiceResult<(DeliveryGuide, Vec<StockMovement>)> {
        let pending = self
            .ledger
            .unposted(guide_number, plan.requests(Some(guide_number)))
            .await?;
        self.ledger.preflight(&pending).await?;

        let guide = self.create_guide(guide_number, plan, at).await?;
        let mut movements = Vec::with_capacity(pending.len());
        for request in &pending {
            movements.push(self.ledger.post_locked(request, at).await?.movement);
        }
        info!(
            guide_number,
            guide_type = ?plan.guide_type,
            posted = movements.len(),
            "guide completed"
        );
        Ok((guide, movements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::KeyedLocks;
    use crate::store::InMemoryDocumentStore;
    use kardex_products::{NewProduct, Product};
    use std::sync::Arc;

    type Generator = GuideGenerator<Arc<InMemoryDocumentStore>>;

    async fn generator_with(skus: &[(&str, i64)]) -> (Generator, LedgerEngine<Arc<InMemoryDocumentStore>>) {
        let docs = Documents::new(Arc::new(InMemoryDocumentStore::new()));
        let ledger = LedgerEngine::new(docs.clone(), Arc::new(KeyedLocks::new()));
        for (sku, stock) in skus {
            let mut product = Product::create(
                NewProduct {
                    sku: sku.to_string(),
                    name: format!("Producto {sku}"),
                    brand: None,
                    description: None,
                    price: Amount::from(20),
                    cost: Amount::ZERO,
                    measurements: Vec::new(),
                    category: None,
                },
                Utc::now(),
            )
            .unwrap();
            docs.insert(&mut product).await.unwrap();
            if *stock > 0 {
                ledger
                    .apply_movement(MovementRequest::new(*sku, *stock, MovementType::In).unit_cost(Amount::from(4)))
                    .await
                    .unwrap();
            }
        }
        (GuideGenerator::new(docs, ledger.clone()), ledger)
    }

    fn dispatch_plan(lines: &[(&str, i64)]) -> GuidePlan {
        GuidePlan::new(
            GuideType::Dispatch,
            MovementType::Out,
            lines
                .iter()
                .map(|(sku, qty)| GuideLine {
                    sku: sku.to_string(),
                    quantity: *qty,
                    lot_cost: None,
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn guide_snapshots_name_and_average_cost() {
        let (guides, ledger) = generator_with(&[("A", 10)]).await;
        let plan = dispatch_plan(&[("A", 3)]);
        let _locks = ledger.lock_skus(plan.skus()).await;
        let (guide, movements) = guides.complete("GR24-0001", &plan, Utc::now()).await.unwrap();

        assert_eq!(guide.items[0].product_name, "Producto A");
        assert_eq!(guide.items[0].unit_cost, Amount::from(4));
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].reference_document.as_deref(), Some("GR24-0001"));
        assert_eq!(ledger.product("A").await.unwrap().stock_current(), 7);
    }

    #[tokio::test]
    async fn repeating_a_step_posts_nothing_twice() {
        let (guides, ledger) = generator_with(&[("A", 10), ("B", 10)]).await;
        let plan = dispatch_plan(&[("A", 2), ("B", 5)]);
        let _locks = ledger.lock_skus(plan.skus()).await;

        // An interrupted run that only got as far as the first movement.
        let first = plan.requests(Some("GR24-0007")).remove(0);
        ledger.post_locked(&first, Utc::now()).await.unwrap();

        let (guide, movements) = guides.complete("GR24-0007", &plan, Utc::now()).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].product_sku, "B");

        let (again, movements) = guides.complete("GR24-0007", &plan, Utc::now()).await.unwrap();
        assert!(movements.is_empty());
        assert_eq!(again.id, guide.id);
        assert_eq!(ledger.product("A").await.unwrap().stock_current(), 8);
        assert_eq!(ledger.product("B").await.unwrap().stock_current(), 5);
    }

    #[tokio::test]
    async fn short_line_stops_before_the_guide_is_written() {
        let (guides, ledger) = generator_with(&[("A", 1)]).await;
        let plan = dispatch_plan(&[("A", 2)]);
        let _locks = ledger.lock_skus(plan.skus()).await;
        let err = guides.complete("GR24-0001", &plan, Utc::now()).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::InsufficientStock { .. })));
        assert!(guides.guide("GR24-0001").await.is_err());
    }
}
