//! Purchasing workflow: purchase orders, purchase invoices, receptions and debit notes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use kardex_core::{Amount, DomainError};
use kardex_inventory::{GuideType, MovementType};
use kardex_parties::Supplier;
use kardex_purchasing::{DebitNote, DebitNoteReason, OrderItem, PurchaseInvoice, PurchaseOrder};

use super::{double_invoicing, load_by};
use crate::error::ServiceResult;
use crate::fulfillment::{Fulfillment, GuideGenerator, GuideLine, GuidePlan};
use crate::ledger::LedgerEngine;
use crate::locks::{KeyedLocks, document_key};
use crate::numbering::{DocumentKind, NumberingService};
use crate::store::{DocumentStore, Documents, Page, Pagination, Query};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_name: String,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct PurchasingWorkflow<S> {
    docs: Documents<S>,
    ledger: LedgerEngine<S>,
    numbering: NumberingService<S>,
    guides: GuideGenerator<S>,
    locks: Arc<KeyedLocks>,
}

impl<S: Clone> Clone for PurchasingWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
            ledger: self.ledger.clone(),
            numbering: self.numbering.clone(),
            guides: self.guides.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S: DocumentStore + Clone> PurchasingWorkflow<S> {
    pub fn new(docs: Documents<S>, locks: Arc<KeyedLocks>) -> Self {
        let ledger = LedgerEngine::new(docs.clone(), locks.clone());
        Self {
            numbering: NumberingService::new(docs.clone()),
            guides: GuideGenerator::new(docs.clone(), ledger.clone()),
            ledger,
            docs,
            locks,
        }
    }

    pub async fn order(&self, order_number: &str) -> ServiceResult<PurchaseOrder> {
        load_by(&self.docs, "order_number", order_number, "purchase order").await
    }

    pub async fn invoice(&self, invoice_number: &str) -> ServiceResult<PurchaseInvoice> {
        load_by(&self.docs, "invoice_number", invoice_number, "purchase invoice").await
    }

    pub async fn list_orders(&self, pagination: Pagination) -> ServiceResult<Page<PurchaseOrder>> {
        let query = Query::new().sort_desc("date").paginate(pagination);
        Ok(self.docs.find(&query).await?)
    }

    pub async fn list_invoices(&self, pagination: Pagination) -> ServiceResult<Page<PurchaseInvoice>> {
        let query = Query::new().sort_desc("invoice_date").paginate(pagination);
        Ok(self.docs.find(&query).await?)
    }

    pub async fn debit_notes_for(&self, invoice_number: &str) -> ServiceResult<Vec<DebitNote>> {
        Ok(self
            .docs
            .find_all(Query::new().eq("invoice_number", invoice_number).sort_asc("date"))
            .await?)
    }

    #[instrument(skip(self, input), fields(supplier = %input.supplier_name, lines = input.items.len()), err)]
    pub async fn create_purchase_order(&self, input: NewPurchaseOrder) -> ServiceResult<PurchaseOrder> {
        let supplier: Supplier = load_by(&self.docs, "name", input.supplier_name.trim(), "supplier").await?;
        for item in &input.items {
            self.ledger.product(&item.product_sku).await?;
        }
        // Validated before a number is consumed.
        let mut order = PurchaseOrder::create("", supplier.name, input.items, input.notes, Utc::now())?;
        order.order_number = self.numbering.next_number(DocumentKind::PurchaseOrder).await?;
        self.docs.insert(&mut order).await?;
        info!(order_number = %order.order_number, total = %order.total_amount, "purchase order created");
        Ok(order)
    }

    /// Issue the purchase invoice for a pending order, with an optional
    /// initial payment.
    ///
    /// An invoice left behind by an interrupted call (invoice stored, order
    /// still pending) is adopted instead of issuing a second one.
    #[instrument(skip(self), err)]
    pub async fn invoice_order(
        &self,
        order_number: &str,
        initial_payment: Option<Amount>,
    ) -> ServiceResult<PurchaseInvoice> {
        let _doc = self.locks.lock(&document_key(order_number)).await;
        let mut order = self.order(order_number).await?;

        if let Some(existing) = self
            .docs
            .find_by::<PurchaseInvoice>("order_number", order_number)
            .await?
        {
            order.ensure_pending().map_err(|_| {
                DomainError::validation(format!("order {order_number} is already invoiced"))
            })?;
            warn!(order_number, invoice_number = %existing.invoice_number, "adopting orphan invoice");
            order.mark_invoiced()?;
            self.docs.save(&mut order).await?;
            return Ok(existing);
        }
        order.ensure_pending()?;

        let at = Utc::now();
        let mut invoice = PurchaseInvoice::from_order(&order, "", at)?;
        if let Some(amount) = initial_payment {
            invoice.register_payment(amount, at, Some("Initial payment".to_string()))?;
        }
        invoice.invoice_number = self.numbering.next_number(DocumentKind::PurchaseInvoice).await?;
        self.docs
            .insert(&mut invoice)
            .await
            .map_err(|e| double_invoicing(e.into(), order_number))?;

        order.mark_invoiced()?;
        self.docs.save(&mut order).await?;
        info!(order_number, invoice_number = %invoice.invoice_number, "purchase order invoiced");
        Ok(invoice)
    }

    #[instrument(skip(self, notes), err)]
    pub async fn register_payment(
        &self,
        invoice_number: &str,
        amount: Amount,
        date: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> ServiceResult<PurchaseInvoice> {
        let _doc = self.locks.lock(&document_key(invoice_number)).await;
        let mut invoice = self.invoice(invoice_number).await?;
        invoice.register_payment(amount, date.unwrap_or_else(Utc::now), notes)?;
        self.docs.save(&mut invoice).await?;
        info!(
            invoice_number,
            paid = %invoice.settlement().amount_paid(),
            status = ?invoice.settlement().payment_status(),
            "payment registered"
        );
        Ok(invoice)
    }

    #[instrument(skip(self), err)]
    pub async fn cancel_order(&self, order_number: &str) -> ServiceResult<PurchaseOrder> {
        let _doc = self.locks.lock(&document_key(order_number)).await;
        let mut order = self.order(order_number).await?;
        order.cancel()?;
        self.docs.save(&mut order).await?;
        Ok(order)
    }

    /// Receive the goods of a purchase invoice: RECEPTION guide, one IN
    /// movement per line at the line's cost, invoice marked RECEIVED.
    #[instrument(skip(self, notes, created_by), err)]
    pub async fn receive_purchase(
        &self,
        invoice_number: &str,
        notes: Option<String>,
        created_by: Option<String>,
    ) -> ServiceResult<Fulfillment<PurchaseInvoice>> {
        let _doc = self.locks.lock(&document_key(invoice_number)).await;
        let mut invoice = self.invoice(invoice_number).await?;
        let claimed = invoice.pending_reception()?.map(str::to_string);

        let mut plan = GuidePlan::new(
            GuideType::Reception,
            MovementType::In,
            invoice.items.iter().map(GuideLine::from).collect(),
        );
        plan.invoice_number = Some(invoice.invoice_number.clone());
        plan.order_number = Some(invoice.order_number.clone());
        plan.target = Some(invoice.supplier_name.clone());
        plan.notes = notes;
        plan.created_by = created_by;

        let _skus = self.ledger.lock_skus(plan.skus()).await;
        let guide_number = match claimed {
            Some(number) => {
                warn!(invoice_number, guide_number = %number, "resuming interrupted reception");
                number
            }
            None => {
                self.ledger.preflight(&plan.requests(None)).await?;
                let number = self.numbering.next_number(DocumentKind::DeliveryGuide).await?;
                invoice.link_guide(&number)?;
                self.docs.save(&mut invoice).await?;
                number
            }
        };

        let (guide, movements) = self.guides.complete(&guide_number, &plan, Utc::now()).await?;
        invoice.mark_received()?;
        self.docs.save(&mut invoice).await?;
        info!(invoice_number, guide_number, "purchase received");
        Ok(Fulfillment {
            document: invoice,
            guide,
            movements,
        })
    }

    /// Receive a pending purchase order directly, without an invoice. The
    /// order ends RECEIVED.
    #[instrument(skip(self, notes, created_by), err)]
    pub async fn receive_purchase_order(
        &self,
        order_number: &str,
        notes: Option<String>,
        created_by: Option<String>,
    ) -> ServiceResult<Fulfillment<PurchaseOrder>> {
        let _doc = self.locks.lock(&document_key(order_number)).await;
        let mut order = self.order(order_number).await?;
        order.ensure_pending()?;

        let mut plan = GuidePlan::new(
            GuideType::Reception,
            MovementType::In,
            order.items.iter().map(GuideLine::from).collect(),
        );
        plan.order_number = Some(order.order_number.clone());
        plan.target = Some(order.supplier_name.clone());
        plan.notes = notes;
        plan.created_by = created_by;

        let _skus = self.ledger.lock_skus(plan.skus()).await;
        let guide_number = match self.guides.for_order(order_number).await? {
            Some(guide) => {
                warn!(order_number, guide_number = %guide.guide_number, "resuming interrupted reception");
                guide.guide_number
            }
            None => {
                self.ledger.preflight(&plan.requests(None)).await?;
                self.numbering.next_number(DocumentKind::DeliveryGuide).await?
            }
        };

        let (guide, movements) = self.guides.complete(&guide_number, &plan, Utc::now()).await?;
        order.mark_received()?;
        self.docs.save(&mut order).await?;
        info!(order_number, guide_number, "purchase order received");
        Ok(Fulfillment {
            document: order,
            guide,
            movements,
        })
    }

    /// Raise what is owed on a purchase invoice. No stock effect.
    #[instrument(skip(self, items, notes), err)]
    pub async fn create_debit_note(
        &self,
        invoice_number: &str,
        reason: DebitNoteReason,
        items: Vec<OrderItem>,
        notes: Option<String>,
    ) -> ServiceResult<(DebitNote, PurchaseInvoice)> {
        let _doc = self.locks.lock(&document_key(invoice_number)).await;
        let mut invoice = self.invoice(invoice_number).await?;

        let mut note = DebitNote::issue("", &invoice, reason, items, notes, Utc::now())?;
        note.debit_note_number = self.numbering.next_number(DocumentKind::DebitNote).await?;
        invoice.apply_debit_note(&note)?;

        self.docs.insert(&mut note).await?;
        self.docs.save(&mut invoice).await?;
        info!(
            invoice_number,
            debit_note_number = %note.debit_note_number,
            total = %note.total_amount,
            "debit note issued"
        );
        Ok((note, invoice))
    }
}
