//! Stock Ledger Engine.
//!
//! Owns the append-only `stock_movements` collection and the stock/cost fields
//! of products. Every post runs under the SKU's keyed lock: read product, decide
//! (pure [`post`]), then save the product against the version it was read at
//! and append the movement in one atomic write.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kardex_core::{Amount, DomainError};
use kardex_inventory::{
    Direction, LossSummary, MovementRequest, MovementType, Posting, StockMovement, aggregate_demand,
    check_availability, post,
};
use kardex_products::Product;

use crate::error::ServiceResult;
use crate::locks::{KeyGuard, KeyedLocks, sku_key};
use crate::store::{DocumentStore, Documents, Page, Pagination, Query};

/// Stock position of one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub sku: String,
    pub name: String,
    pub stock_current: i64,
    pub cost: Amount,
    pub stock_value: Amount,
}

impl TryFrom<&Product> for StockLevel {
    type Error = DomainError;

    fn try_from(p: &Product) -> Result<Self, Self::Error> {
        Ok(Self {
            sku: p.sku.clone(),
            name: p.name.clone(),
            stock_current: p.stock_current(),
            cost: p.cost(),
            stock_value: p.stock_value()?,
        })
    }
}

/// Result of an adjust-to-target call. `movement` is `None` when the product
/// was already at the target.
#[derive(Debug, Clone, PartialEq)]
pub struct StockAdjustment {
    pub product: Product,
    pub movement: Option<StockMovement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossReport {
    pub movements: Vec<StockMovement>,
    pub summary: LossSummary,
}

pub struct LedgerEngine<S> {
    docs: Documents<S>,
    locks: Arc<KeyedLocks>,
}

impl<S: Clone> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S: DocumentStore> LedgerEngine<S> {
    pub fn new(docs: Documents<S>, locks: Arc<KeyedLocks>) -> Self {
        Self { docs, locks }
    }

    pub async fn product(&self, sku: &str) -> ServiceResult<Product> {
        self.docs
            .find_by::<Product>("sku", sku)
            .await?
            .ok_or_else(|| DomainError::not_found("product", sku).into())
    }

    pub async fn get_current_stock(&self, sku: &str) -> ServiceResult<StockLevel> {
        Ok(StockLevel::try_from(&self.product(sku).await?)?)
    }

    /// Post one movement against one product.
    #[instrument(
        skip(self, request),
        fields(sku = %request.sku, movement_type = ?request.movement_type, quantity = request.quantity),
        err
    )]
    pub async fn apply_movement(&self, request: MovementRequest) -> ServiceResult<Posting> {
        let _guard = self.locks.lock(&sku_key(&request.sku)).await;
        let posting = self.post_locked(&request, Utc::now()).await?;
        info!(
            stock_current = posting.product.stock_current(),
            cost = %posting.product.cost(),
            "movement posted"
        );
        Ok(posting)
    }

    /// Post several movements all-or-nothing with respect to stock: every SKU is
    /// locked, and outbound demand aggregated per SKU is checked against stock
    /// before the first movement is written.
    #[instrument(skip(self, requests), fields(lines = requests.len()), err)]
    pub async fn apply_batch(&self, requests: Vec<MovementRequest>) -> ServiceResult<Vec<Posting>> {
        let skus: Vec<String> = requests.iter().map(|r| r.sku.clone()).collect();
        let _guards = self.lock_skus(skus).await;
        self.preflight(&requests).await?;
        let at = Utc::now();
        let mut postings = Vec::with_capacity(requests.len());
        for request in &requests {
            postings.push(self.post_locked(request, at).await?);
        }
        Ok(postings)
    }

    /// Bring `sku` to exactly `target` units with one ADJUSTMENT movement.
    #[instrument(skip(self, notes, responsible), err)]
    pub async fn adjust_stock_to(
        &self,
        sku: &str,
        target: i64,
        notes: Option<String>,
        responsible: Option<String>,
    ) -> ServiceResult<StockAdjustment> {
        let _guard = self.locks.lock(&sku_key(sku)).await;
        self.adjust_locked(sku, target, notes, responsible).await
    }

    /// Signed adjustment: positive adds stock, negative removes it.
    #[instrument(skip(self, reason, responsible), err)]
    pub async fn create_inventory_adjustment(
        &self,
        sku: &str,
        quantity_adjusted: i64,
        reason: impl Into<String> + Send,
        responsible: Option<String>,
    ) -> ServiceResult<Posting> {
        let request = MovementRequest::adjustment(sku, quantity_adjusted)?
            .notes(reason)
            .responsible(responsible);
        self.apply_movement(request).await
    }

    #[instrument(skip(self, notes, responsible), err)]
    pub async fn register_loss(
        &self,
        sku: &str,
        quantity: i64,
        loss_type: MovementType,
        notes: Option<String>,
        responsible: Option<String>,
    ) -> ServiceResult<Posting> {
        if !loss_type.is_loss() {
            return Err(DomainError::validation(format!("{loss_type:?} is not a loss type")).into());
        }
        let mut request = MovementRequest::new(sku, quantity, loss_type).responsible(responsible);
        request.notes = notes;
        self.apply_movement(request).await
    }

    /// Loss movements, newest first, optionally for one SKU.
    pub async fn losses_report(&self, sku: Option<&str>) -> ServiceResult<LossReport> {
        let mut query = Query::new().eq("direction", "OUTBOUND").sort_desc("date");
        if let Some(sku) = sku {
            query = query.eq("product_sku", sku);
        }
        let movements: Vec<StockMovement> = self
            .docs
            .find_all::<StockMovement>(query)
            .await?
            .into_iter()
            .filter(|m| m.movement_type.is_loss())
            .collect();
        let summary = LossSummary::from_movements(&movements)?;
        Ok(LossReport { movements, summary })
    }

    /// Kardex of one SKU, newest first. Works for deleted products too.
    pub async fn movements_for(&self, sku: &str, pagination: Pagination) -> ServiceResult<Page<StockMovement>> {
        let query = Query::new()
            .eq("product_sku", sku)
            .sort_desc("date")
            .paginate(pagination);
        Ok(self.docs.find(&query).await?)
    }

    /// Every movement carrying `reference` (a guide or note number).
    pub async fn movements_referencing(&self, reference: &str) -> ServiceResult<Vec<StockMovement>> {
        Ok(self
            .docs
            .find_all(Query::new().eq("reference_document", reference))
            .await?)
    }

    /// Keys are owned so the returned future borrows nothing but `self`.
    pub(crate) async fn lock_skus(&self, skus: Vec<String>) -> Vec<KeyGuard> {
        let keys: Vec<String> = skus.iter().map(|sku| sku_key(sku)).collect();
        self.locks.lock_many(keys).await
    }

    /// Check a set of requests before any of them is posted: quantities,
    /// directions, product existence, and aggregated outbound demand.
    ///
    /// Callers hold the SKU locks.
    pub(crate) async fn preflight(&self, requests: &[MovementRequest]) -> ServiceResult<()> {
        let mut products: HashMap<String, Product> = HashMap::new();
        let mut outbound = Vec::new();
        for request in requests {
            if request.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for {} must be greater than zero",
                    request.sku
                ))
                .into());
            }
            if request.resolved_direction()? == Direction::Outbound {
                outbound.push((request.sku.as_str(), request.quantity));
            }
            if !products.contains_key(&request.sku) {
                let product = self.product(&request.sku).await?;
                products.insert(request.sku.clone(), product);
            }
        }
        check_availability(&aggregate_demand(outbound)?, &products)?;
        Ok(())
    }

    /// Requests from `requests` with no matching movement under `reference` yet.
    ///
    /// One stored movement (same SKU and quantity) satisfies one request, so a
    /// retried workflow step posts only what the interrupted run did not.
    pub(crate) async fn unposted(
        &self,
        reference: &str,
        requests: Vec<MovementRequest>,
    ) -> ServiceResult<Vec<MovementRequest>> {
        let mut existing = self.movements_referencing(reference).await?;
        Ok(requests
            .into_iter()
            .filter(|r| {
                match existing
                    .iter()
                    .position(|m| m.product_sku == r.sku && m.quantity == r.quantity)
                {
                    Some(idx) => {
                        existing.swap_remove(idx);
                        false
                    }
                    None => true,
                }
            })
            .collect())
    }

    /// Callers hold the SKU lock.
    pub(crate) async fn post_locked(
        &self,
        request: &MovementRequest,
        at: DateTime<Utc>,
    ) -> ServiceResult<Posting> {
        let product = self.product(&request.sku).await?;
        let mut posting = post(&product, request, at)?;
        self.docs
            .save_and_insert(&mut posting.product, &mut posting.movement)
            .await?;
        Ok(posting)
    }

    /// Callers hold the SKU lock.
    pub(crate) async fn adjust_locked(
        &self,
        sku: &str,
        target: i64,
        notes: Option<String>,
        responsible: Option<String>,
    ) -> ServiceResult<StockAdjustment> {
        if target < 0 {
            return Err(DomainError::validation("target stock cannot be negative").into());
        }
        let product = self.product(sku).await?;
        let diff = target - product.stock_current();
        if diff == 0 {
            return Ok(StockAdjustment {
                product,
                movement: None,
            });
        }

        let mut request = MovementRequest::adjustment(sku, diff)?.responsible(responsible);
        request.notes = notes.or_else(|| Some(format!("Stock set to {target}")));
        let posting = self.post_locked(&request, Utc::now()).await?;
        info!(sku, from = product.stock_current(), to = target, "stock adjusted");
        Ok(StockAdjustment {
            product: posting.product,
            movement: Some(posting.movement),
        })
    }
}
