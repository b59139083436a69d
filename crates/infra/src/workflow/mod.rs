//! Order/Invoice Workflow Engine.
//!
//! Purchasing and sales run the same state machine: order → invoice →
//! payments → physical fulfillment. Each step takes the document's keyed lock
//! first and the SKU locks second.
//!
//! Fulfillment is split into resumable stages: claim a guide number on the
//! invoice, record the guide, post the missing movements, flip the status. A
//! run that stopped part way leaves the invoice with a linked guide and a
//! stale status; the next call resumes under the same guide number.

pub mod purchasing;
pub mod sales;

pub use purchasing::{NewPurchaseOrder, PurchasingWorkflow};
pub use sales::{CreditNoteOutcome, NewSalesOrder, SalesWorkflow};

use kardex_core::{Document, DomainError};

use crate::error::{ServiceError, ServiceResult};
use crate::store::{DocumentStore, Documents};

/// Load the `D` whose `field` equals `key`, or `NotFound` naming `entity`.
pub(crate) async fn load_by<S, D>(docs: &Documents<S>, field: &str, key: &str, entity: &str) -> ServiceResult<D>
where
    S: DocumentStore,
    D: Document,
{
    docs.find_by::<D>(field, key)
        .await?
        .ok_or_else(|| DomainError::not_found(entity, key).into())
}

/// A second invoice for the same order collides on the invoice's
/// `order_number` key; report it as the business rule it is.
pub(crate) fn double_invoicing(err: ServiceError, order_number: &str) -> ServiceError {
    match err {
        ServiceError::Domain(DomainError::Duplicate { ref field, .. }) if field == "order_number" => {
            DomainError::validation(format!("order {order_number} is already invoiced")).into()
        }
        other => other,
    }
}
