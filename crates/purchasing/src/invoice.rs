use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, impl_document};
use kardex_invoicing::Settlement;

use crate::debit_note::DebitNote;
use crate::order::{OrderItem, PurchaseOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceptionStatus {
    NotReceived,
    Received,
}

/// Fiscal document issued from exactly one purchase order.
///
/// Items are a snapshot of the order at invoicing time. `order_number` is a
/// unique key, so an order can be invoiced at most once even when two
/// invoicing attempts race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    pub id: DocumentId,
    pub invoice_number: String,
    pub order_number: String,
    pub supplier_name: String,
    pub invoice_date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    #[serde(flatten)]
    settlement: Settlement,
    reception_status: ReceptionStatus,
    guide_number: Option<String>,
    #[serde(default)]
    pub debit_note_numbers: Vec<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(
    PurchaseInvoice,
    "purchase_invoices",
    ["invoice_number", "order_number"]
);

impl PurchaseInvoice {
    /// Build the invoice for a pending order. The order itself is not touched.
    pub fn from_order(
        order: &PurchaseOrder,
        invoice_number: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        order.ensure_pending()?;
        Ok(Self {
            id: DocumentId::new(),
            invoice_number: invoice_number.into(),
            order_number: order.order_number.clone(),
            supplier_name: order.supplier_name.clone(),
            invoice_date: at,
            items: order.items.clone(),
            settlement: Settlement::new(order.total_amount),
            reception_status: ReceptionStatus::NotReceived,
            guide_number: None,
            debit_note_numbers: Vec::new(),
            version: 0,
        })
    }

    pub fn settlement(&self) -> &Settlement {
        &self.settlement
    }

    pub fn total_amount(&self) -> Amount {
        self.settlement.total_amount()
    }

    pub fn reception_status(&self) -> ReceptionStatus {
        self.reception_status
    }

    pub fn guide_number(&self) -> Option<&str> {
        self.guide_number.as_deref()
    }

    pub fn register_payment(
        &mut self,
        amount: Amount,
        date: DateTime<Utc>,
        notes: Option<String>,
    ) -> DomainResult<()> {
        self.settlement.register_payment(amount, date, notes)
    }

    /// Guide already claimed by an earlier, interrupted reception, if any.
    ///
    /// Fails when the goods were already received.
    pub fn pending_reception(&self) -> DomainResult<Option<&str>> {
        if self.reception_status == ReceptionStatus::Received {
            return Err(DomainError::validation(format!(
                "purchase invoice {} was already received",
                self.invoice_number
            )));
        }
        Ok(self.guide_number.as_deref())
    }

    /// Claim `guide_number` for this invoice's reception.
    pub fn link_guide(&mut self, guide_number: impl Into<String>) -> DomainResult<()> {
        let guide_number = guide_number.into();
        match self.pending_reception()? {
            Some(existing) if existing != guide_number => Err(DomainError::validation(format!(
                "purchase invoice {} is linked to guide {existing}",
                self.invoice_number
            ))),
            _ => {
                self.guide_number = Some(guide_number);
                Ok(())
            }
        }
    }

    pub fn mark_received(&mut self) -> DomainResult<()> {
        if self.pending_reception()?.is_none() {
            return Err(DomainError::validation(format!(
                "purchase invoice {} has no reception guide",
                self.invoice_number
            )));
        }
        self.reception_status = ReceptionStatus::Received;
        Ok(())
    }

    /// Guide linked but status never flipped: a reception that stopped half way.
    pub fn is_reception_stale(&self) -> bool {
        self.guide_number.is_some() && self.reception_status == ReceptionStatus::NotReceived
    }

    /// Raise the invoice total by a debit note issued against it.
    pub fn apply_debit_note(&mut self, note: &DebitNote) -> DomainResult<()> {
        if note.invoice_number != self.invoice_number {
            return Err(DomainError::validation(format!(
                "debit note {} belongs to invoice {}",
                note.debit_note_number, note.invoice_number
            )));
        }
        if self.debit_note_numbers.contains(&note.debit_note_number) {
            return Err(DomainError::validation(format!(
                "debit note {} already applied",
                note.debit_note_number
            )));
        }
        self.settlement.apply_debit(note.total_amount)?;
        self.debit_note_numbers.push(note.debit_note_number.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debit_note::DebitNoteReason;
    use kardex_invoicing::PaymentStatus;

    fn order() -> PurchaseOrder {
        PurchaseOrder::create(
            "OC24-0001",
            "Distribuidora Norte",
            vec![OrderItem {
                product_sku: "A".into(),
                quantity: 10,
                unit_cost: Amount::from(5),
            }],
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn invoice_snapshots_order() {
        let o = order();
        let inv = PurchaseInvoice::from_order(&o, "FC24-0001", Utc::now()).unwrap();
        assert_eq!(inv.order_number, "OC24-0001");
        assert_eq!(inv.items, o.items);
        assert_eq!(inv.total_amount(), Amount::from(50));
        assert_eq!(inv.reception_status(), ReceptionStatus::NotReceived);
    }

    #[test]
    fn invoicing_a_non_pending_order_fails() {
        let mut o = order();
        o.cancel().unwrap();
        let err = PurchaseInvoice::from_order(&o, "FC24-0001", Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reception_claim_then_complete() {
        let mut inv = PurchaseInvoice::from_order(&order(), "FC24-0001", Utc::now()).unwrap();
        assert_eq!(inv.pending_reception().unwrap(), None);
        assert!(inv.mark_received().is_err());

        inv.link_guide("GR24-0001").unwrap();
        assert!(inv.is_reception_stale());
        assert_eq!(inv.pending_reception().unwrap(), Some("GR24-0001"));
        assert!(inv.link_guide("GR24-0002").is_err());

        inv.mark_received().unwrap();
        assert!(!inv.is_reception_stale());
        assert!(matches!(inv.pending_reception(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn debit_note_raises_amount_due_once() {
        let mut inv = PurchaseInvoice::from_order(&order(), "FC24-0001", Utc::now()).unwrap();
        inv.register_payment(Amount::from(50), Utc::now(), None).unwrap();
        assert_eq!(inv.settlement().payment_status(), PaymentStatus::Paid);

        let note = DebitNote::issue(
            "ND-00001",
            &inv,
            DebitNoteReason::PriceAdjustment,
            vec![OrderItem {
                product_sku: "A".into(),
                quantity: 10,
                unit_cost: Amount::from(1),
            }],
            None,
            Utc::now(),
        )
        .unwrap();
        inv.apply_debit_note(&note).unwrap();

        assert_eq!(inv.settlement().amount_due().unwrap(), Amount::from(60));
        assert_eq!(inv.total_amount(), Amount::from(60));
        assert_eq!(inv.settlement().payment_status(), PaymentStatus::Partial);
        assert!(inv.apply_debit_note(&note).is_err());
    }

    #[test]
    fn settlement_fields_are_flattened() {
        let inv = PurchaseInvoice::from_order(&order(), "FC24-0001", Utc::now()).unwrap();
        let body = serde_json::to_value(&inv).unwrap();
        assert_eq!(body["payment_status"], serde_json::json!("PENDING"));
        assert_eq!(body["reception_status"], serde_json::json!("NOT_RECEIVED"));
        assert_eq!(body["total_amount"], serde_json::json!(50.0));
    }
}
