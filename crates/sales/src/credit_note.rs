use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, add_quantities, impl_document};
use kardex_invoicing::{lines_total, validate_lines};

use crate::invoice::SalesInvoice;
use crate::order::SalesLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditNoteReason {
    Return,
    Discount,
    Correction,
    Other,
}

impl CreditNoteReason {
    /// Returned goods come back into stock.
    pub fn restocks(self) -> bool {
        matches!(self, CreditNoteReason::Return)
    }
}

/// Lowers what is owed on a sales invoice. A `RETURN` also posts inbound
/// movements for its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditNote {
    pub id: DocumentId,
    pub credit_note_number: String,
    pub invoice_number: String,
    pub customer_id: DocumentId,
    pub customer_name: String,
    pub date: DateTime<Utc>,
    pub reason: CreditNoteReason,
    pub items: Vec<SalesLine>,
    pub total_amount: Amount,
    pub notes: Option<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(CreditNote, "credit_notes", ["credit_note_number"]);

impl CreditNote {
    /// `previously_returned` holds per-SKU quantities of earlier returns on
    /// the same invoice; a return may never take back more than was invoiced.
    pub fn issue(
        credit_note_number: impl Into<String>,
        invoice: &SalesInvoice,
        reason: CreditNoteReason,
        items: Vec<SalesLine>,
        previously_returned: &BTreeMap<String, i64>,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_lines(&items)?;

        let mut requested: BTreeMap<&str, i64> = BTreeMap::new();
        for line in &items {
            let invoiced = invoice.invoiced_quantity(&line.product_sku)?;
            if invoiced == 0 {
                return Err(DomainError::validation(format!(
                    "{} is not on sales invoice {}",
                    line.product_sku, invoice.invoice_number
                )));
            }
            let total = requested.entry(line.product_sku.as_str()).or_default();
            *total = add_quantities(*total, line.quantity)?;
        }

        if reason.restocks() {
            for (sku, qty) in &requested {
                let earlier = previously_returned.get(*sku).copied().unwrap_or(0);
                let invoiced = invoice.invoiced_quantity(sku)?;
                if add_quantities(earlier, *qty)? > invoiced {
                    return Err(DomainError::validation(format!(
                        "cannot return {qty} of {sku}: {invoiced} invoiced, {earlier} already returned"
                    )));
                }
            }
        }

        let total_amount = lines_total(&items)?;
        if !total_amount.is_positive() {
            return Err(DomainError::validation("credit note total must be positive"));
        }

        Ok(Self {
            id: DocumentId::new(),
            credit_note_number: credit_note_number.into(),
            invoice_number: invoice.invoice_number.clone(),
            customer_id: invoice.customer_id,
            customer_name: invoice.customer_name.clone(),
            date: at,
            reason,
            items,
            total_amount,
            notes,
            version: 0,
        })
    }

    /// Per-SKU quantities returned by this note; empty unless it restocks.
    pub fn returned_quantities(&self) -> DomainResult<BTreeMap<String, i64>> {
        let mut out: BTreeMap<String, i64> = BTreeMap::new();
        if self.reason.restocks() {
            for line in &self.items {
                let total = out.entry(line.product_sku.clone()).or_default();
                *total = add_quantities(*total, line.quantity)?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::SalesOrder;
    use kardex_parties::{ContactInfo, Customer, NewCustomer};
    use proptest::prelude::*;

    fn invoice(qty: i64) -> SalesInvoice {
        let customer = Customer::create(
            NewCustomer {
                name: "Bodega Sur".into(),
                ruc: "10456789012".into(),
                contact: ContactInfo::default(),
                branches: Vec::new(),
            },
            Utc::now(),
        )
        .unwrap();
        let order = SalesOrder::create(
            "OV24-0001",
            &customer,
            vec![line("A", qty, 10)],
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        SalesInvoice::from_order(&order, &customer.ruc, "FV24-0001", Utc::now()).unwrap()
    }

    fn line(sku: &str, quantity: i64, price: i64) -> SalesLine {
        SalesLine {
            product_sku: sku.into(),
            quantity,
            unit_price: Amount::from(price),
        }
    }

    fn issue(inv: &SalesInvoice, reason: CreditNoteReason, qty: i64, earlier: i64) -> DomainResult<CreditNote> {
        let previously = BTreeMap::from([("A".to_string(), earlier)]);
        CreditNote::issue("NC-00001", inv, reason, vec![line("A", qty, 10)], &previously, None, Utc::now())
    }

    #[test]
    fn return_within_invoiced_quantity() {
        let note = issue(&invoice(5), CreditNoteReason::Return, 3, 0).unwrap();
        assert_eq!(note.total_amount, Amount::from(30));
        assert_eq!(note.returned_quantities().unwrap().get("A"), Some(&3));
    }

    #[test]
    fn cumulative_returns_cannot_exceed_invoice() {
        let err = issue(&invoice(5), CreditNoteReason::Return, 3, 3).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn discount_does_not_restock() {
        let note = issue(&invoice(5), CreditNoteReason::Discount, 1, 5).unwrap();
        assert!(note.returned_quantities().unwrap().is_empty());
    }

    #[test]
    fn foreign_sku_is_rejected() {
        let err = CreditNote::issue(
            "NC-00001",
            &invoice(5),
            CreditNoteReason::Correction,
            vec![line("B", 1, 1)],
            &BTreeMap::new(),
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn applying_lowers_amount_due() {
        let mut inv = invoice(5);
        let note = issue(&inv, CreditNoteReason::Return, 2, 0).unwrap();
        inv.apply_credit_note(&note).unwrap();
        assert_eq!(inv.settlement().amount_due().unwrap(), Amount::from(30));
        assert!(inv.apply_credit_note(&note).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        #[test]
        fn returns_are_bounded_by_invoiced(invoiced in 1i64..50, earlier in 0i64..60, qty in 1i64..60) {
            let result = issue(&invoice(invoiced), CreditNoteReason::Return, qty, earlier);
            prop_assert_eq!(result.is_ok(), earlier + qty <= invoiced);
        }
    }
}
