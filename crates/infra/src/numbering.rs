//! Document Numbering Service.
//!
//! Two schemes coexist:
//!
//! - year-scoped `{PREFIX}{YY}-{SEQ:04}` (orders, invoices, guides), one
//!   counter per (prefix, entity, year);
//! - perpetual `{PREFIX}-{SEQ:05}` (credit and debit notes), one counter per
//!   (prefix, entity).
//!
//! Both draw from the store's atomic counter, so concurrent callers never see
//! the same number.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::error::ServiceResult;
use crate::store::{DocumentStore, Documents};

/// Collection holding the counters.
pub const SEQUENCES: &str = "document_sequences";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberScheme {
    YearScoped,
    Perpetual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PurchaseOrder,
    PurchaseInvoice,
    SalesOrder,
    SalesInvoice,
    DeliveryGuide,
    CreditNote,
    DebitNote,
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "OC",
            DocumentKind::PurchaseInvoice => "FC",
            DocumentKind::SalesOrder => "OV",
            DocumentKind::SalesInvoice => "FV",
            DocumentKind::DeliveryGuide => "GR",
            DocumentKind::CreditNote => "NC",
            DocumentKind::DebitNote => "ND",
        }
    }

    /// Entity name the counter is scoped to.
    pub fn entity(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "purchase_orders",
            DocumentKind::PurchaseInvoice => "purchase_invoices",
            DocumentKind::SalesOrder => "sales_orders",
            DocumentKind::SalesInvoice => "sales_invoices",
            DocumentKind::DeliveryGuide => "delivery_guides",
            DocumentKind::CreditNote => "credit_notes",
            DocumentKind::DebitNote => "debit_notes",
        }
    }

    pub fn scheme(self) -> NumberScheme {
        match self {
            DocumentKind::CreditNote | DocumentKind::DebitNote => NumberScheme::Perpetual,
            _ => NumberScheme::YearScoped,
        }
    }
}

pub fn format_year_scoped(prefix: &str, yy: &str, seq: i64) -> String {
    format!("{prefix}{yy}-{seq:04}")
}

pub fn format_perpetual(prefix: &str, seq: i64) -> String {
    format!("{prefix}-{seq:05}")
}

pub struct NumberingService<S> {
    docs: Documents<S>,
}

impl<S: Clone> Clone for NumberingService<S> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
        }
    }
}

impl<S: DocumentStore> NumberingService<S> {
    pub fn new(docs: Documents<S>) -> Self {
        Self { docs }
    }

    pub async fn next_number(&self, kind: DocumentKind) -> ServiceResult<String> {
        self.next_number_at(kind, Utc::now()).await
    }

    pub async fn next_number_at(&self, kind: DocumentKind, at: DateTime<Utc>) -> ServiceResult<String> {
        self.next(kind.entity(), kind.prefix(), kind.scheme(), at).await
    }

    /// Mint the next number for `(entity, prefix)` under `scheme`; `at` picks
    /// the year for year-scoped numbers.
    #[instrument(skip(self), err)]
    pub async fn next(
        &self,
        entity: &str,
        prefix: &str,
        scheme: NumberScheme,
        at: DateTime<Utc>,
    ) -> ServiceResult<String> {
        match scheme {
            NumberScheme::YearScoped => {
                let yy = at.format("%y").to_string();
                let seq = self
                    .docs
                    .increment(SEQUENCES, &format!("{prefix}:{entity}:{yy}"), "value")
                    .await?;
                Ok(format_year_scoped(prefix, &yy, seq))
            }
            NumberScheme::Perpetual => {
                let seq = self
                    .docs
                    .increment(SEQUENCES, &format!("{prefix}:{entity}"), "value")
                    .await?;
                Ok(format_perpetual(prefix, seq))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn service() -> NumberingService<Arc<InMemoryDocumentStore>> {
        NumberingService::new(Documents::new(Arc::new(InMemoryDocumentStore::new())))
    }

    #[tokio::test]
    async fn first_invoices_of_the_year() {
        let numbering = service();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            numbering.next_number_at(DocumentKind::SalesInvoice, at).await.unwrap(),
            "FV24-0001"
        );
        assert_eq!(
            numbering.next_number_at(DocumentKind::SalesInvoice, at).await.unwrap(),
            "FV24-0002"
        );
    }

    #[tokio::test]
    async fn year_scoped_counters_restart_each_year() {
        let numbering = service();
        let y24 = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        let y25 = Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap();
        numbering.next_number_at(DocumentKind::PurchaseOrder, y24).await.unwrap();
        assert_eq!(
            numbering.next_number_at(DocumentKind::PurchaseOrder, y25).await.unwrap(),
            "OC25-0001"
        );
    }

    #[tokio::test]
    async fn notes_use_the_perpetual_scheme() {
        let numbering = service();
        assert_eq!(numbering.next_number(DocumentKind::CreditNote).await.unwrap(), "NC-00001");
        assert_eq!(numbering.next_number(DocumentKind::DebitNote).await.unwrap(), "ND-00001");
        assert_eq!(numbering.next_number(DocumentKind::CreditNote).await.unwrap(), "NC-00002");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_callers_get_distinct_gapless_numbers() {
        let numbering = Arc::new(service());
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut handles = Vec::new();
        for _ in 0..100 {
            let numbering = numbering.clone();
            handles.push(tokio::spawn(async move {
                numbering.next_number_at(DocumentKind::SalesOrder, at).await
            }));
        }
        let mut issued = HashSet::new();
        for h in handles {
            assert!(issued.insert(h.await.unwrap().unwrap()));
        }
        let expected: HashSet<String> = (1..=100).map(|n| format_year_scoped("OV", "24", n)).collect();
        assert_eq!(issued, expected);
    }
}
