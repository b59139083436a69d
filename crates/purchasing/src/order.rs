use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, impl_document};
use kardex_invoicing::{InvoiceLine, lines_total, validate_lines};

/// Purchase order status lifecycle.
///
/// `PENDING → {INVOICED | RECEIVED | CANCELLED}`; the three targets are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Pending,
    Invoiced,
    Received,
    Cancelled,
}

/// Purchase line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_sku: String,
    pub quantity: i64,
    pub unit_cost: Amount,
}

impl InvoiceLine for OrderItem {
    fn sku(&self) -> &str {
        &self.product_sku
    }

    fn quantity(&self) -> i64 {
        self.quantity
    }

    fn unit_amount(&self) -> Amount {
        self.unit_cost
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: DocumentId,
    pub order_number: String,
    pub supplier_name: String,
    pub date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    status: PurchaseOrderStatus,
    pub total_amount: Amount,
    pub notes: Option<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(PurchaseOrder, "purchase_orders", ["order_number"]);

impl PurchaseOrder {
    pub fn create(
        order_number: impl Into<String>,
        supplier_name: impl Into<String>,
        items: Vec<OrderItem>,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let supplier_name = supplier_name.into();
        if supplier_name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        validate_lines(&items)?;

        Ok(Self {
            id: DocumentId::new(),
            order_number: order_number.into(),
            supplier_name,
            date: at,
            total_amount: lines_total(&items)?,
            items,
            status: PurchaseOrderStatus::Pending,
            notes,
            version: 0,
        })
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn ensure_pending(&self) -> DomainResult<()> {
        match self.status {
            PurchaseOrderStatus::Pending => Ok(()),
            other => Err(DomainError::validation(format!(
                "purchase order {} is {other:?} and can no longer change",
                self.order_number
            ))),
        }
    }

    pub fn mark_invoiced(&mut self) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Invoiced)
    }

    /// Goods received directly against the order, without an invoice.
    pub fn mark_received(&mut self) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Received)
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.transition(PurchaseOrderStatus::Cancelled)
    }

    fn transition(&mut self, to: PurchaseOrderStatus) -> DomainResult<()> {
        self.ensure_pending()?;
        self.status = to;
        Ok(())
    }
}
