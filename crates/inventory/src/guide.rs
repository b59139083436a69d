//! Delivery guides: documents recording goods physically received, dispatched or transferred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DocumentId, DomainError, DomainResult, add_quantities, impl_document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuideType {
    Reception,
    Dispatch,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuideStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Line snapshot: name and cost are frozen when the guide is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideItem {
    pub sku: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_cost: Amount,
}

impl GuideItem {
    pub fn total_cost(&self) -> DomainResult<Amount> {
        self.unit_cost.times(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryGuide {
    pub id: DocumentId,
    pub guide_number: String,
    pub guide_type: GuideType,
    pub status: GuideStatus,
    /// Invoice that triggered the guide (absent for transfers and direct receptions).
    pub invoice_number: Option<String>,
    /// Order received without an invoice.
    pub order_number: Option<String>,
    /// Supplier, customer or target warehouse, by name.
    pub target: Option<String>,
    pub delivery_address: Option<String>,
    pub items: Vec<GuideItem>,
    pub created_date: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(DeliveryGuide, "delivery_guides", ["guide_number"]);

impl DeliveryGuide {
    /// A guide recording something that already happened: status COMPLETED,
    /// completed at `at`.
    pub fn completed(
        guide_number: impl Into<String>,
        guide_type: GuideType,
        items: Vec<GuideItem>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("a guide needs at least one item"));
        }
        if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
            return Err(DomainError::validation(format!(
                "guide quantity for {} must be greater than zero",
                item.sku
            )));
        }

        Ok(Self {
            id: DocumentId::new(),
            guide_number: guide_number.into(),
            guide_type,
            status: GuideStatus::Completed,
            invoice_number: None,
            order_number: None,
            target: None,
            delivery_address: None,
            items,
            created_date: at,
            completed_date: Some(at),
            notes: None,
            created_by: None,
            version: 0,
        })
    }

    pub fn total_cost(&self) -> DomainResult<Amount> {
        self.items
            .iter()
            .try_fold(Amount::ZERO, |total, item| total.checked_add(item.total_cost()?))
    }

    pub fn total_quantity(&self) -> DomainResult<i64> {
        self.items
            .iter()
            .try_fold(0i64, |total, item| add_quantities(total, item.quantity))
    }

    /// Only pending guides can be cancelled; completed guides are immutable.
    pub fn cancel(&mut self) -> DomainResult<()> {
        match self.status {
            GuideStatus::Pending => {
                self.status = GuideStatus::Cancelled;
                Ok(())
            }
            GuideStatus::Completed => Err(DomainError::validation(format!(
                "guide {} is completed and cannot be cancelled",
                self.guide_number
            ))),
            GuideStatus::Cancelled => Err(DomainError::validation(format!(
                "guide {} is already cancelled",
                self.guide_number
            ))),
        }
    }
}
