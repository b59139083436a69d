//! Sales workflow: sales orders, sales invoices, dispatches and credit notes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use kardex_core::{Amount, DocumentId, DomainError, add_quantities};
use kardex_inventory::{GuideType, MovementRequest, MovementType, StockMovement};
use kardex_parties::Customer;
use kardex_sales::{CreditNote, CreditNoteReason, SalesInvoice, SalesLine, SalesOrder};

use super::{double_invoicing, load_by};
use crate::error::ServiceResult;
use crate::fulfillment::{Fulfillment, GuideGenerator, GuideLine, GuidePlan};
use crate::ledger::LedgerEngine;
use crate::locks::{KeyedLocks, document_key};
use crate::numbering::{DocumentKind, NumberingService};
use crate::store::{DocumentStore, Documents, Page, Pagination, Query};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSalesOrder {
    pub customer_id: DocumentId,
    pub items: Vec<SalesLine>,
    #[serde(default)]
    pub delivery_branch_name: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditNoteOutcome {
    pub credit_note: CreditNote,
    pub invoice: SalesInvoice,
    /// IN movements of a return; empty for other reasons.
    pub movements: Vec<StockMovement>,
}

pub struct SalesWorkflow<S> {
    docs: Documents<S>,
    ledger: LedgerEngine<S>,
    numbering: NumberingService<S>,
    guides: GuideGenerator<S>,
    locks: Arc<KeyedLocks>,
}

impl<S: Clone> Clone for SalesWorkflow<S> {
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

impl<S: DocumentStore + Clone> SalesWorkflow<S> {
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

    pub async fn order(&self, order_number: &str) -> ServiceResult<SalesOrder> {
        load_by(&self.docs, "order_number", order_number, "sales order").await
    }

    pub async fn invoice(&self, invoice_number: &str) -> ServiceResult<SalesInvoice> {
        load_by(&self.docs, "invoice_number", invoice_number, "sales invoice").await
    }

    pub async fn list_orders(&self, pagination: Pagination) -> ServiceResult<Page<SalesOrder>> {
        let query = Query::new().sort_desc("date").paginate(pagination);
        Ok(self.docs.find(&query).await?)
    }

    pub async fn list_invoices(&self, pagination: Pagination) -> ServiceResult<Page<SalesInvoice>> {
        let query = Query::new().sort_desc("invoice_date").paginate(pagination);
        Ok(self.docs.find(&query).await?)
    }

    pub async fn credit_notes_for(&self, invoice_number: &str) -> ServiceResult<Vec<CreditNote>> {
        Ok(self
            .docs
            .find_all(Query::new().eq("invoice_number", invoice_number).sort_asc("date"))
            .await?)
    }

    async fn customer(&self, id: DocumentId) -> ServiceResult<Customer> {
        self.docs
            .get::<Customer>(id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", id.to_string()).into())
    }

    #[instrument(skip(self, input), fields(customer_id = %input.customer_id, lines = input.items.len()), err)]
    pub async fn create_sales_order(&self, input: NewSalesOrder) -> ServiceResult<SalesOrder> {
        let customer = self.customer(input.customer_id).await?;
        for line in &input.items {
            self.ledger.product(&line.product_sku).await?;
        }
        let mut order = SalesOrder::create(
            "",
            &customer,
            input.items,
            input.delivery_branch_name,
            input.delivery_address,
            Utc::now(),
        )?;
        order.order_number = self.numbering.next_number(DocumentKind::SalesOrder).await?;
        self.docs.insert(&mut order).await?;
        info!(order_number = %order.order_number, total = %order.total_amount, "sales order created");
        Ok(order)
    }

    /// Issue the sales invoice for a pending order. Same recovery rule as the
    /// purchase side: an orphan invoice for the order is adopted.
    #[instrument(skip(self), err)]
    pub async fn invoice_order(
        &self,
        order_number: &str,
        initial_payment: Option<Amount>,
    ) -> ServiceResult<SalesInvoice> {
        let _doc = self.locks.lock(&document_key(order_number)).await;
        let mut order = self.order(order_number).await?;

        if let Some(existing) = self
            .docs
            .find_by::<SalesInvoice>("order_number", order_number)
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

        let customer = self.customer(order.customer_id).await?;
        let at = Utc::now();
        let mut invoice = SalesInvoice::from_order(&order, customer.ruc, "", at)?;
        if let Some(amount) = initial_payment {
            invoice.register_payment(amount, at, Some("Initial payment".to_string()))?;
        }
        invoice.invoice_number = self.numbering.next_number(DocumentKind::SalesInvoice).await?;
        self.docs
            .insert(&mut invoice)
            .await
            .map_err(|e| double_invoicing(e.into(), order_number))?;

        order.mark_invoiced()?;
        self.docs.save(&mut order).await?;
        info!(order_number, invoice_number = %invoice.invoice_number, "sales order invoiced");
        Ok(invoice)
    }

    #[instrument(skip(self, notes), err)]
    pub async fn register_payment(
        &self,
        invoice_number: &str,
        amount: Amount,
        date: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> ServiceResult<SalesInvoice> {
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
    pub async fn cancel_order(&self, order_number: &str) -> ServiceResult<SalesOrder> {
        let _doc = self.locks.lock(&document_key(order_number)).await;
        let mut order = self.order(order_number).await?;
        order.cancel()?;
        self.docs.save(&mut order).await?;
        Ok(order)
    }

    /// Ship a sales invoice: stock for every line is checked before anything
    /// is written, then one DISPATCH guide and one OUT movement per line.
    #[instrument(skip(self, notes, created_by), err)]
    pub async fn dispatch_sale(
        &self,
        invoice_number: &str,
        notes: Option<String>,
        created_by: Option<String>,
    ) -> ServiceResult<Fulfillment<SalesInvoice>> {
        let _doc = self.locks.lock(&document_key(invoice_number)).await;
        let mut invoice = self.invoice(invoice_number).await?;
        let claimed = invoice.pending_dispatch()?.map(str::to_string);

        let mut plan = GuidePlan::new(
            GuideType::Dispatch,
            MovementType::Out,
            invoice.items.iter().map(GuideLine::from).collect(),
        );
        plan.invoice_number = Some(invoice.invoice_number.clone());
        plan.order_number = Some(invoice.order_number.clone());
        plan.target = Some(invoice.customer_name.clone());
        plan.delivery_address = invoice.delivery_address.clone();
        plan.notes = notes;
        plan.created_by = created_by;

        let _skus = self.ledger.lock_skus(plan.skus()).await;
        let guide_number = match claimed {
            Some(number) => {
                warn!(invoice_number, guide_number = %number, "resuming interrupted dispatch");
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
        invoice.mark_dispatched()?;
        self.docs.save(&mut invoice).await?;
        info!(invoice_number, guide_number, "sale dispatched");
        Ok(Fulfillment {
            document: invoice,
            guide,
            movements,
        })
    }

    /// Issue a credit note against a sales invoice.
    ///
    /// The note lowers the amount due (never below what is already paid). A
    /// RETURN also brings the goods back: one IN movement per line at the
    /// product's current average cost, referencing the note number.
    #[instrument(skip(self, items, notes), err)]
    pub async fn create_credit_note(
        &self,
        invoice_number: &str,
        reason: CreditNoteReason,
        items: Vec<SalesLine>,
        notes: Option<String>,
    ) -> ServiceResult<CreditNoteOutcome> {
        let _doc = self.locks.lock(&document_key(invoice_number)).await;
        let mut invoice = self.invoice(invoice_number).await?;

        let mut returned: BTreeMap<String, i64> = BTreeMap::new();
        for earlier in self.credit_notes_for(invoice_number).await? {
            for (sku, qty) in earlier.returned_quantities()? {
                let total = returned.entry(sku).or_default();
                *total = add_quantities(*total, qty)?;
            }
        }

        let at = Utc::now();
        let mut note = CreditNote::issue("", &invoice, reason, items, &returned, notes, at)?;
        // The credit must fit the outstanding balance before a number is used.
        invoice.clone().apply_credit_note(&note)?;

        let requests: Vec<MovementRequest> = if reason.restocks() {
            note.items
                .iter()
                .map(|l| MovementRequest::new(&l.product_sku, l.quantity, MovementType::In))
                .collect()
        } else {
            Vec::new()
        };
        let skus: Vec<String> = requests.iter().map(|r| r.sku.clone()).collect();
        let _skus = self.ledger.lock_skus(skus).await;
        self.ledger.preflight(&requests).await?;

        note.credit_note_number = self.numbering.next_number(DocumentKind::CreditNote).await?;
        invoice.apply_credit_note(&note)?;
        self.docs.insert(&mut note).await?;

        let mut movements = Vec::with_capacity(requests.len());
        for request in requests {
            let request = request
                .reference(&note.credit_note_number)
                .notes(format!("Return on {invoice_number}"));
            movements.push(self.ledger.post_locked(&request, at).await?.movement);
        }

        self.docs.save(&mut invoice).await?;
        info!(
            invoice_number,
            credit_note_number = %note.credit_note_number,
            total = %note.total_amount,
            restocked = movements.len(),
            "credit note issued"
        );
        Ok(CreditNoteOutcome {
            credit_note: note,
            invoice,
            movements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use kardex_invoicing::PaymentStatus;
    use kardex_parties::{ContactInfo, CustomerBranch, NewCustomer};
    use kardex_products::{NewProduct, Product};
    use kardex_sales::{DispatchStatus, SalesOrderStatus};

    type Workflow = SalesWorkflow<Arc<InMemoryDocumentStore>>;

    async fn workflow(stock: &[(&str, i64)]) -> (Workflow, Customer) {
        let docs = Documents::new(Arc::new(InMemoryDocumentStore::new()));
        let locks = Arc::new(KeyedLocks::new());
        let ledger = LedgerEngine::new(docs.clone(), locks.clone());
        for (sku, qty) in stock {
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
            if *qty > 0 {
                ledger
                    .apply_movement(MovementRequest::new(*sku, *qty, MovementType::In).unit_cost(Amount::from(8)))
                    .await
                    .unwrap();
            }
        }
        let mut customer = Customer::create(
            NewCustomer {
                name: "Constructora Andina".to_string(),
                ruc: "20555555551".to_string(),
                contact: ContactInfo {
                    address: Some("Jr. Lima 100".to_string()),
                    ..ContactInfo::default()
                },
                branches: vec![CustomerBranch::new("Obra Norte", "Av. Norte 5").main()],
            },
            Utc::now(),
        )
        .unwrap();
        docs.insert(&mut customer).await.unwrap();
        (SalesWorkflow::new(docs, locks), customer)
    }

    fn line(sku: &str, quantity: i64, price: i64) -> SalesLine {
        SalesLine {
            product_sku: sku.to_string(),
            quantity,
            unit_price: Amount::from(price),
        }
    }

    async fn invoiced(wf: &Workflow, customer: &Customer, items: Vec<SalesLine>) -> SalesInvoice {
        let order = wf
            .create_sales_order(NewSalesOrder {
                customer_id: customer.id,
                items,
                delivery_branch_name: None,
                delivery_address: None,
            })
            .await
            .unwrap();
        wf.invoice_order(&order.order_number, None).await.unwrap()
    }

    #[tokio::test]
    async fn invoice_numbers_follow_each_other() {
        let (wf, customer) = workflow(&[("SKU-A", 10)]).await;
        let first = invoiced(&wf, &customer, vec![line("SKU-A", 1, 20)]).await;
        let second = invoiced(&wf, &customer, vec![line("SKU-A", 1, 20)]).await;
        let yy = Utc::now().format("%y").to_string();
        assert_eq!(first.invoice_number, format!("FV{yy}-0001"));
        assert_eq!(second.invoice_number, format!("FV{yy}-0002"));
        assert_eq!(first.customer_ruc, "20555555551");
        assert_eq!(first.delivery_address.as_deref(), Some("Av. Norte 5"));
    }

    #[tokio::test]
    async fn second_invoice_for_an_order_is_rejected() {
        let (wf, customer) = workflow(&[("SKU-A", 10)]).await;
        let invoice = invoiced(&wf, &customer, vec![line("SKU-A", 2, 20)]).await;
        let err = wf.invoice_order(&invoice.order_number, None).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
        assert_eq!(
            wf.order(&invoice.order_number).await.unwrap().status(),
            SalesOrderStatus::Invoiced
        );
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_invoiced() {
        let (wf, customer) = workflow(&[("SKU-A", 10)]).await;
        let order = wf
            .create_sales_order(NewSalesOrder {
                customer_id: customer.id,
                items: vec![line("SKU-A", 1, 20)],
                delivery_branch_name: None,
                delivery_address: Some("Calle 8".to_string()),
            })
            .await
            .unwrap();
        wf.cancel_order(&order.order_number).await.unwrap();
        assert!(wf.cancel_order(&order.order_number).await.is_err());
        let err = wf.invoice_order(&order.order_number, None).await.unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn dispatch_is_all_or_nothing() {
        let (wf, customer) = workflow(&[("SKU-A", 10), ("SKU-B", 2)]).await;
        let invoice = invoiced(&wf, &customer, vec![line("SKU-A", 5, 20), line("SKU-B", 5, 20)]).await;

        let err = wf.dispatch_sale(&invoice.invoice_number, None, None).await.unwrap_err();
        assert_eq!(err.as_domain(), Some(&DomainError::insufficient_stock("SKU-B", 2, 5)));
        assert_eq!(wf.ledger.product("SKU-A").await.unwrap().stock_current(), 10);

        let untouched = wf.invoice(&invoice.invoice_number).await.unwrap();
        assert_eq!(untouched.guide_number(), None);
        assert_eq!(untouched.dispatch_status(), DispatchStatus::NotDispatched);
    }

    #[tokio::test]
    async fn dispatch_posts_out_movements_once() {
        let (wf, customer) = workflow(&[("SKU-A", 10)]).await;
        let invoice = invoiced(&wf, &customer, vec![line("SKU-A", 4, 20)]).await;

        let done = wf
            .dispatch_sale(&invoice.invoice_number, Some("entrega parcial".to_string()), None)
            .await
            .unwrap();
        assert_eq!(done.document.dispatch_status(), DispatchStatus::Dispatched);
        assert_eq!(done.guide.delivery_address.as_deref(), Some("Av. Norte 5"));
        assert_eq!(done.movements[0].unit_cost, Amount::from(8));
        assert_eq!(wf.ledger.product("SKU-A").await.unwrap().stock_current(), 6);

        assert!(wf.dispatch_sale(&invoice.invoice_number, None, None).await.is_err());
        assert_eq!(wf.ledger.product("SKU-A").await.unwrap().stock_current(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_dispatches_never_oversell() {
        let (wf, customer) = workflow(&[("SKU-A", 10)]).await;
        let mut numbers = Vec::new();
        for _ in 0..6 {
            numbers.push(invoiced(&wf, &customer, vec![line("SKU-A", 3, 20)]).await.invoice_number);
        }

        let wf = Arc::new(wf);
        let handles: Vec<_> = numbers
            .into_iter()
            .map(|n| {
                let wf = wf.clone();
                tokio::spawn(async move { wf.dispatch_sale(&n, None, None).await })
            })
            .collect();

        let mut shipped = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => shipped += 1,
                Err(err) => assert!(matches!(err.as_domain(), Some(DomainError::InsufficientStock { .. }))),
            }
        }
        assert_eq!(shipped, 3);
        assert_eq!(wf.ledger.product("SKU-A").await.unwrap().stock_current(), 1);
    }

    #[tokio::test]
    async fn return_restocks_and_reduces_amount_due() {
        let (wf, customer) = workflow(&[("SKU-A", 10)]).await;
        let invoice = invoiced(&wf, &customer, vec![line("SKU-A", 4, 20)]).await;
        wf.dispatch_sale(&invoice.invoice_number, None, None).await.unwrap();
        wf.register_payment(&invoice.invoice_number, Amount::from(40), None, None)
            .await
            .unwrap();

        let outcome = wf
            .create_credit_note(
                &invoice.invoice_number,
                CreditNoteReason::Return,
                vec![line("SKU-A", 2, 20)],
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.credit_note.credit_note_number, "NC-00001");
        assert_eq!(outcome.invoice.settlement().amount_due().unwrap(), Amount::from(40));
        assert_eq!(outcome.invoice.settlement().payment_status(), PaymentStatus::Paid);
        assert_eq!(outcome.movements.len(), 1);
        assert_eq!(
            outcome.movements[0].reference_document.as_deref(),
            Some("NC-00001")
        );
        assert_eq!(wf.ledger.product("SKU-A").await.unwrap().stock_current(), 8);

        // Only two units are left to return.
        let err = wf
            .create_credit_note(
                &invoice.invoice_number,
                CreditNoteReason::Return,
                vec![line("SKU-A", 3, 0)],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn credit_beyond_outstanding_is_rejected_without_using_a_number() {
        let (wf, customer) = workflow(&[("SKU-A", 10)]).await;
        let invoice = invoiced(&wf, &customer, vec![line("SKU-A", 1, 20)]).await;
        wf.register_payment(&invoice.invoice_number, Amount::from(15), None, None)
            .await
            .unwrap();

        let err = wf
            .create_credit_note(
                &invoice.invoice_number,
                CreditNoteReason::Discount,
                vec![line("SKU-A", 1, 10)],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err.as_domain(), Some(DomainError::Validation(_))));

        let outcome = wf
            .create_credit_note(
                &invoice.invoice_number,
                CreditNoteReason::Discount,
                vec![line("SKU-A", 1, 5)],
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.credit_note.credit_note_number, "NC-00001");
        assert!(outcome.movements.is_empty());
        assert_eq!(outcome.invoice.settlement().payment_status(), PaymentStatus::Paid);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_and_return_run_on_spawned_tasks() {
        let (wf, customer) = workflow(&[("SKU-A", 10), ("SKU-B", 10)]).await;
        let invoice = invoiced(&wf, &customer, vec![line("SKU-A", 3, 20), line("SKU-B", 1, 20)]).await;
        let number = invoice.invoice_number.clone();

        let dispatching = wf.clone();
        let dispatch_number = number.clone();
        tokio::spawn(async move { dispatching.dispatch_sale(&dispatch_number, None, None).await })
            .await
            .unwrap()
            .unwrap();

        let returning = wf.clone();
        let outcome = tokio::spawn(async move {
            returning
                .create_credit_note(
                    &number,
                    CreditNoteReason::Return,
                    vec![line("SKU-A", 1, 20), line("SKU-B", 1, 20)],
                    None,
                )
                .await
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(outcome.movements.len(), 2);
        assert_eq!(wf.ledger.product("SKU-A").await.unwrap().stock_current(), 8);
        assert_eq!(wf.ledger.product("SKU-B").await.unwrap().stock_current(), 10);
    }
}
