//! Product catalog: create, edit, list and delete products and categories.
//!
//! Attribute edits never touch stock. Stock only changes through the ledger:
//! an initial IN movement on creation, an ADJUSTMENT when an edit asks for a
//! new stock figure.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use kardex_core::DomainError;
use kardex_inventory::{MovementRequest, MovementType};
use kardex_products::{Category, NewProduct, Product, ProductChanges};

use crate::error::ServiceResult;
use crate::ledger::LedgerEngine;
use crate::locks::{KeyedLocks, sku_key};
use crate::store::{DocumentStore, Documents, Page, Pagination, Query};

/// Filters for the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    /// Case-insensitive match on the name.
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

pub struct CatalogService<S> {
    docs: Documents<S>,
    ledger: LedgerEngine<S>,
    locks: Arc<KeyedLocks>,
}

impl<S: Clone> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
            ledger: self.ledger.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S: DocumentStore + Clone> CatalogService<S> {
    pub fn new(docs: Documents<S>, locks: Arc<KeyedLocks>) -> Self {
        Self {
            ledger: LedgerEngine::new(docs.clone(), locks.clone()),
            docs,
            locks,
        }
    }

    pub async fn product(&self, sku: &str) -> ServiceResult<Product> {
        self.ledger.product(sku).await
    }

    pub async fn list_products(&self, filter: ProductFilter, pagination: Pagination) -> ServiceResult<Page<Product>> {
        let mut query = Query::new().sort_asc("sku").paginate(pagination);
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            query = query.contains("name", search.trim());
        }
        if let Some(category) = filter.category {
            query = query.eq("category", category);
        }
        if let Some(brand) = filter.brand {
            query = query.eq("brand", brand);
        }
        Ok(self.docs.find(&query).await?)
    }

    /// Insert a product and, when `initial_stock > 0`, post its opening IN
    /// movement (reference `INITIAL-{sku}`) at the product's cost.
    #[instrument(skip(self, draft, responsible), fields(sku = %draft.sku), err)]
    pub async fn create_product(
        &self,
        draft: NewProduct,
        initial_stock: i64,
        responsible: Option<String>,
    ) -> ServiceResult<Product> {
        if initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative").into());
        }
        if let Some(category) = draft.category.as_deref() {
            self.category(category).await?;
        }
        let mut product = Product::create(draft, Utc::now())?;

        let _guard = self.locks.lock(&sku_key(&product.sku)).await;
        self.docs.insert(&mut product).await?;
        if initial_stock > 0 {
            let request = MovementRequest::new(&product.sku, initial_stock, MovementType::In)
                .unit_cost(product.cost())
                .reference(format!("INITIAL-{}", product.sku))
                .notes("Initial stock")
                .responsible(responsible);
            product = self.ledger.post_locked(&request, Utc::now()).await?.product;
        }
        info!(stock = product.stock_current(), "product created");
        Ok(product)
    }

    /// Edit catalog attributes; when `new_stock` differs from the current
    /// stock an ADJUSTMENT brings it there.
    #[instrument(skip(self, changes, responsible), err)]
    pub async fn update_product(
        &self,
        sku: &str,
        changes: ProductChanges,
        new_stock: Option<i64>,
        responsible: Option<String>,
    ) -> ServiceResult<Product> {
        if let Some(category) = changes.category.as_deref() {
            self.category(category).await?;
        }
        let _guard = self.locks.lock(&sku_key(sku)).await;
        let mut product = self.ledger.product(sku).await?;
        product.apply_changes(changes)?;
        self.docs.save(&mut product).await?;

        match new_stock {
            Some(target) => Ok(self
                .ledger
                .adjust_locked(sku, target, Some("Stock updated from product edit".to_string()), responsible)
                .await?
                .product),
            None => Ok(product),
        }
    }

    /// Remove the product document. Its movements stay in the ledger.
    #[instrument(skip(self), err)]
    pub async fn delete_product(&self, sku: &str) -> ServiceResult<()> {
        let _guard = self.locks.lock(&sku_key(sku)).await;
        let product = self.ledger.product(sku).await?;
        self.docs.delete(&product).await?;
        info!("product deleted");
        Ok(())
    }

    pub async fn create_category(&self, name: &str, description: Option<String>) -> ServiceResult<Category> {
        let mut category = Category::new(name, description)?;
        self.docs.insert(&mut category).await?;
        Ok(category)
    }

    pub async fn category(&self, name: &str) -> ServiceResult<Category> {
        self.docs
            .find_by::<Category>("name", name)
            .await?
            .ok_or_else(|| DomainError::not_found("category", name).into())
    }

    pub async fn categories(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.docs.find_all(Query::new().sort_asc("name")).await?)
    }
}
