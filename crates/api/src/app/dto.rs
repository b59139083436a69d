use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{Amount, DomainError};
use kardex_infra::catalog::ProductFilter;
use kardex_infra::ledger::{StockAdjustment, StockLevel};
use kardex_infra::store::Pagination;
use kardex_inventory::{MovementType, Posting, StockMovement};
use kardex_products::{NewProduct, ProductChanges};
use kardex_purchasing::{DebitNote, DebitNoteReason, OrderItem, PurchaseInvoice};
use kardex_sales::{CreditNoteReason, SalesLine};

/// Query string shared by the list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

impl ListParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }

    pub fn product_filter(&self) -> ProductFilter {
        ProductFilter {
            search: self.search.clone(),
            category: self.category.clone(),
            brand: self.brand.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    #[serde(flatten)]
    pub product: NewProduct,
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default)]
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(flatten)]
    pub changes: ProductChanges,
    #[serde(default)]
    pub new_stock: Option<i64>,
    #[serde(default)]
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockRequest {
    pub new_stock: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryAdjustmentRequest {
    pub sku: String,
    pub quantity_adjusted: i64,
    pub reason: String,
    #[serde(default)]
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LossRequest {
    pub sku: String,
    pub quantity: i64,
    pub loss_type: MovementType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LossQuery {
    pub sku: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceOrderRequest {
    #[serde(default)]
    pub initial_payment: Option<Amount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub amount: Amount,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of receive/dispatch calls. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FulfillmentRequest {
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebitNoteRequest {
    pub reason: DebitNoteReason,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreditNoteRequest {
    pub reason: CreditNoteReason,
    pub items: Vec<SalesLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A posted movement with the product position it left behind.
#[derive(Debug, Clone, Serialize)]
pub struct PostingResponse {
    pub product: StockLevel,
    pub movement: StockMovement,
}

impl TryFrom<Posting> for PostingResponse {
    type Error = DomainError;

    fn try_from(posting: Posting) -> Result<Self, Self::Error> {
        Ok(Self {
            product: StockLevel::try_from(&posting.product)?,
            movement: posting.movement,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustmentResponse {
    pub product: StockLevel,
    pub movement: Option<StockMovement>,
}

impl TryFrom<StockAdjustment> for StockAdjustmentResponse {
    type Error = DomainError;

    fn try_from(adjustment: StockAdjustment) -> Result<Self, Self::Error> {
        Ok(Self {
            product: StockLevel::try_from(&adjustment.product)?,
            movement: adjustment.movement,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebitNoteResponse {
    pub debit_note: DebitNote,
    pub invoice: PurchaseInvoice,
}
