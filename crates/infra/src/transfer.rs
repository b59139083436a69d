//! Stock transfers from the main warehouse to another one.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kardex_core::{Amount, DomainError};
use kardex_inventory::{GuideType, MovementType};

use crate::error::ServiceResult;
use crate::fulfillment::{GuideGenerator, GuideLine, GuidePlan};
use crate::ledger::LedgerEngine;
use crate::locks::KeyedLocks;
use crate::numbering::{DocumentKind, NumberingService};
use crate::store::{DocumentStore, Documents};
use crate::warehouses::WarehouseService;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferItem {
    pub sku: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferRequest {
    pub target_warehouse: String,
    pub items: Vec<TransferItem>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub guide_number: String,
    pub target_warehouse: String,
    pub items_count: usize,
    pub total_cost: Amount,
}

pub struct TransferService<S> {
    ledger: LedgerEngine<S>,
    numbering: NumberingService<S>,
    guides: GuideGenerator<S>,
    warehouses: WarehouseService<S>,
}

impl<S: Clone> Clone for TransferService<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            numbering: self.numbering.clone(),
            guides: self.guides.clone(),
            warehouses: self.warehouses.clone(),
        }
    }
}

impl<S: DocumentStore + Clone> TransferService<S> {
    pub fn new(docs: Documents<S>, locks: Arc<KeyedLocks>) -> Self {
        let ledger = LedgerEngine::new(docs.clone(), locks);
        Self {
            numbering: NumberingService::new(docs.clone()),
            guides: GuideGenerator::new(docs.clone(), ledger.clone()),
            warehouses: WarehouseService::new(docs),
            ledger,
        }
    }

    /// Move stock out of the main warehouse: every line is checked first, then
    /// one TRANSFER guide and one TRANSFER_OUT movement per line.
    #[instrument(skip(self, request), fields(target = %request.target_warehouse, lines = request.items.len()), err)]
    pub async fn transfer_stock(&self, request: TransferRequest) -> ServiceResult<TransferReceipt> {
        if request.items.is_empty() {
            return Err(DomainError::validation("a transfer needs at least one item").into());
        }
        let target = self.warehouses.by_code(&request.target_warehouse).await?;
        target.ensure_active()?;
        let source = self.warehouses.main().await?;
        if source.code == target.code {
            return Err(DomainError::validation(format!(
                "cannot transfer from {} to itself",
                source.code
            ))
            .into());
        }

        let lines = request
            .items
            .iter()
            .map(|i| GuideLine {
                sku: i.sku.clone(),
                quantity: i.quantity,
                lot_cost: None,
            })
            .collect();
        let mut plan = GuidePlan::new(GuideType::Transfer, MovementType::TransferOut, lines);
        plan.target = Some(target.name.clone());
        plan.warehouse = Some(source.code.clone());
        plan.target_warehouse = Some(target.code.clone());
        plan.notes = request.notes;
        plan.created_by = request.created_by;

        let _skus = self.ledger.lock_skus(plan.skus()).await;
        self.ledger.preflight(&plan.requests(None)).await?;
        let guide_number = self.numbering.next_number(DocumentKind::DeliveryGuide).await?;
        let (guide, _) = self.guides.complete(&guide_number, &plan, Utc::now()).await?;

        info!(guide_number, target = %target.code, "stock transferred");
        Ok(TransferReceipt {
            guide_number,
            target_warehouse: target.name,
            items_count: guide.items.len(),
            total_cost: guide.total_cost()?,
        })
    }
}
