use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, add_quantities, impl_document};
use kardex_invoicing::Settlement;

use crate::credit_note::CreditNote;
use crate::order::{SalesLine, SalesOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchStatus {
    NotDispatched,
    Dispatched,
}

/// Fiscal document issued from exactly one sales order.
///
/// Same shape as the purchase side: items snapshot the order, `order_number`
/// is unique, settlement fields are flattened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesInvoice {
    pub id: DocumentId,
    pub invoice_number: String,
    pub order_number: String,
    pub customer_id: DocumentId,
    pub customer_name: String,
    pub customer_ruc: String,
    pub invoice_date: DateTime<Utc>,
    pub items: Vec<SalesLine>,
    #[serde(flatten)]
    settlement: Settlement,
    dispatch_status: DispatchStatus,
    guide_number: Option<String>,
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub credit_note_numbers: Vec<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(
    SalesInvoice,
    "sales_invoices",
    ["invoice_number", "order_number"]
);

impl SalesInvoice {
    pub fn from_order(
        order: &SalesOrder,
        customer_ruc: impl Into<String>,
        invoice_number: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        order.ensure_pending()?;
        Ok(Self {
            id: DocumentId::new(),
            invoice_number: invoice_number.into(),
            order_number: order.order_number.clone(),
            customer_id: order.customer_id,
            customer_name: order.customer_name.clone(),
            customer_ruc: customer_ruc.into(),
            invoice_date: at,
            items: order.items.clone(),
            settlement: Settlement::new(order.total_amount),
            dispatch_status: DispatchStatus::NotDispatched,
            guide_number: None,
            delivery_address: order.delivery_address.clone(),
            credit_note_numbers: Vec::new(),
            version: 0,
        })
    }

    pub fn settlement(&self) -> &Settlement {
        &self.settlement
    }

    pub fn total_amount(&self) -> Amount {
        self.settlement.total_amount()
    }

    pub fn dispatch_status(&self) -> DispatchStatus {
        self.dispatch_status
    }

    pub fn guide_number(&self) -> Option<&str> {
        self.guide_number.as_deref()
    }

    /// Quantity invoiced for `sku`, summed over duplicate lines.
    pub fn invoiced_quantity(&self, sku: &str) -> DomainResult<i64> {
        self.items
            .iter()
            .filter(|l| l.product_sku == sku)
            .try_fold(0i64, |total, l| add_quantities(total, l.quantity))
    }

    pub fn register_payment(
        &mut self,
        amount: Amount,
        date: DateTime<Utc>,
        notes: Option<String>,
    ) -> DomainResult<()> {
        self.settlement.register_payment(amount, date, notes)
    }

    /// Guide already claimed by an interrupted dispatch, if any.
    pub fn pending_dispatch(&self) -> DomainResult<Option<&str>> {
        if self.dispatch_status == DispatchStatus::Dispatched {
            return Err(DomainError::validation(format!(
                "sales invoice {} was already dispatched",
                self.invoice_number
            )));
        }
        Ok(self.guide_number.as_deref())
    }

    pub fn link_guide(&mut self, guide_number: impl Into<String>) -> DomainResult<()> {
        let guide_number = guide_number.into();
        match self.pending_dispatch()? {
            Some(existing) if existing != guide_number => Err(DomainError::validation(format!(
                "sales invoice {} is linked to guide {existing}",
                self.invoice_number
            ))),
            _ => {
                self.guide_number = Some(guide_number);
                Ok(())
            }
        }
    }

    pub fn mark_dispatched(&mut self) -> DomainResult<()> {
        if self.pending_dispatch()?.is_none() {
            return Err(DomainError::validation(format!(
                "sales invoice {} has no dispatch guide",
                self.invoice_number
            )));
        }
        self.dispatch_status = DispatchStatus::Dispatched;
        Ok(())
    }

    pub fn is_dispatch_stale(&self) -> bool {
        self.guide_number.is_some() && self.dispatch_status == DispatchStatus::NotDispatched
    }

    /// Lower the amount owed by a credit note issued against this invoice.
    pub fn apply_credit_note(&mut self, note: &CreditNote) -> DomainResult<()> {
        if note.invoice_number != self.invoice_number {
            return Err(DomainError::validation(format!(
                "credit note {} belongs to invoice {}",
                note.credit_note_number, note.invoice_number
            )));
        }
        if self.credit_note_numbers.contains(&note.credit_note_number) {
            return Err(DomainError::validation(format!(
                "credit note {} already applied",
                note.credit_note_number
            )));
        }
        self.settlement.apply_credit(note.total_amount)?;
        self.credit_note_numbers.push(note.credit_note_number.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kardex_invoicing::PaymentStatus;
    use kardex_parties::{ContactInfo, Customer, NewCustomer};

    fn order() -> SalesOrder {
        let customer = Customer::create(
            NewCustomer {
                name: "Bodega Sur".into(),
                ruc: "10456789012".into(),
                contact: ContactInfo {
                    address: Some("Av. Sur 9".into()),
                    ..ContactInfo::default()
                },
                branches: Vec::new(),
            },
            Utc::now(),
        )
        .unwrap();
        SalesOrder::create(
            "OV24-0001",
            &customer,
            vec![SalesLine {
                product_sku: "A".into(),
                quantity: 5,
                unit_price: Amount::from(20),
            }],
            None,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn invoice_carries_delivery_address_and_customer() {
        let inv = SalesInvoice::from_order(&order(), "10456789012", "FV24-0001", Utc::now()).unwrap();
        assert_eq!(inv.delivery_address.as_deref(), Some("Av. Sur 9"));
        assert_eq!(inv.total_amount(), Amount::from(100));
        assert_eq!(inv.dispatch_status(), DispatchStatus::NotDispatched);
        assert_eq!(inv.settlement().payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn dispatch_claim_then_complete() {
        let mut inv = SalesInvoice::from_order(&order(), "10456789012", "FV24-0001", Utc::now()).unwrap();
        inv.link_guide("GR24-0007").unwrap();
        inv.link_guide("GR24-0007").unwrap();
        assert!(inv.is_dispatch_stale());
        assert!(inv.link_guide("GR24-0008").is_err());

        inv.mark_dispatched().unwrap();
        assert_eq!(inv.dispatch_status(), DispatchStatus::Dispatched);
        assert!(matches!(inv.mark_dispatched(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn wire_names() {
        let inv = SalesInvoice::from_order(&order(), "10456789012", "FV24-0001", Utc::now()).unwrap();
        let body = serde_json::to_value(&inv).unwrap();
        assert_eq!(body["dispatch_status"], serde_json::json!("NOT_DISPATCHED"));
        assert_eq!(body["amount_paid"], serde_json::json!(0.0));
    }
}
