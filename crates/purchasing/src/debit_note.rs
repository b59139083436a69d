use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, impl_document};
use kardex_invoicing::{lines_total, validate_lines};

use crate::invoice::PurchaseInvoice;
use crate::order::OrderItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebitNoteReason {
    PriceAdjustment,
    AdditionalCharge,
    Interest,
    Other,
}

/// Raises what is owed on a purchase invoice. No stock effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitNote {
    pub id: DocumentId,
    pub debit_note_number: String,
    pub invoice_number: String,
    pub supplier_name: String,
    pub date: DateTime<Utc>,
    pub reason: DebitNoteReason,
    pub items: Vec<OrderItem>,
    pub total_amount: Amount,
    pub notes: Option<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(DebitNote, "debit_notes", ["debit_note_number"]);

impl DebitNote {
    /// Every line must name a SKU that appears on the invoice.
    pub fn issue(
        debit_note_number: impl Into<String>,
        invoice: &PurchaseInvoice,
        reason: DebitNoteReason,
        items: Vec<OrderItem>,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_lines(&items)?;
        if let Some(stray) = items
            .iter()
            .find(|i| !invoice.items.iter().any(|x| x.product_sku == i.product_sku))
        {
            return Err(DomainError::validation(format!(
                "{} is not on purchase invoice {}",
                stray.product_sku, invoice.invoice_number
            )));
        }

        let total_amount = lines_total(&items)?;
        if !total_amount.is_positive() {
            return Err(DomainError::validation("debit note total must be positive"));
        }

        Ok(Self {
            id: DocumentId::new(),
            debit_note_number: debit_note_number.into(),
            invoice_number: invoice.invoice_number.clone(),
            supplier_name: invoice.supplier_name.clone(),
            date: at,
            reason,
            items,
            total_amount,
            notes,
            version: 0,
        })
    }
}
