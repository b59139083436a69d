//! Customers and suppliers.
//!
//! Branch edits go through the customer's invariant-checked setters under the
//! customer's keyed lock, then a version-checked save.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use kardex_core::{DocumentId, DomainError, DomainResult};
use kardex_parties::{Customer, CustomerBranch, NewCustomer, NewSupplier, Supplier};

use crate::error::ServiceResult;
use crate::locks::{KeyedLocks, document_key};
use crate::store::{DocumentStore, Documents, Page, Pagination, Query};

pub struct PartyService<S> {
    docs: Documents<S>,
    locks: Arc<KeyedLocks>,
}

impl<S: Clone> Clone for PartyService<S> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<S: DocumentStore> PartyService<S> {
    pub fn new(docs: Documents<S>, locks: Arc<KeyedLocks>) -> Self {
        Self { docs, locks }
    }

    #[instrument(skip(self, input), fields(ruc = %input.ruc), err)]
    pub async fn create_customer(&self, input: NewCustomer) -> ServiceResult<Customer> {
        let mut customer = Customer::create(input, Utc::now())?;
        self.docs.insert(&mut customer).await?;
        info!(customer_id = %customer.id, "customer created");
        Ok(customer)
    }

    pub async fn customer(&self, id: DocumentId) -> ServiceResult<Customer> {
        self.docs
            .get::<Customer>(id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", id.to_string()).into())
    }

    pub async fn customer_by_ruc(&self, ruc: &str) -> ServiceResult<Customer> {
        self.docs
            .find_by::<Customer>("ruc", ruc)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", ruc).into())
    }

    pub async fn list_customers(&self, search: Option<&str>, pagination: Pagination) -> ServiceResult<Page<Customer>> {
        let mut query = Query::new().sort_asc("name").paginate(pagination);
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.contains("name", search);
        }
        Ok(self.docs.find(&query).await?)
    }

    pub async fn add_branch(&self, id: DocumentId, branch: CustomerBranch) -> ServiceResult<Customer> {
        self.edit_customer(id, |c| c.add_branch(branch)).await
    }

    pub async fn set_main_branch(&self, id: DocumentId, branch_name: &str) -> ServiceResult<Customer> {
        self.edit_customer(id, |c| c.set_main_branch(branch_name)).await
    }

    pub async fn deactivate_branch(&self, id: DocumentId, branch_name: &str) -> ServiceResult<Customer> {
        self.edit_customer(id, |c| c.deactivate_branch(branch_name)).await
    }

    pub async fn activate_branch(&self, id: DocumentId, branch_name: &str) -> ServiceResult<Customer> {
        self.edit_customer(id, |c| c.activate_branch(branch_name)).await
    }

    pub async fn replace_branches(&self, id: DocumentId, branches: Vec<CustomerBranch>) -> ServiceResult<Customer> {
        self.edit_customer(id, |c| c.replace_branches(branches)).await
    }

    async fn edit_customer<F>(&self, id: DocumentId, edit: F) -> ServiceResult<Customer>
    where
        F: FnOnce(&mut Customer) -> DomainResult<()> + Send,
    {
        let _guard = self.locks.lock(&document_key(&id.to_string())).await;
        let mut customer = self.customer(id).await?;
        edit(&mut customer)?;
        self.docs.save(&mut customer).await?;
        Ok(customer)
    }

    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn create_supplier(&self, input: NewSupplier) -> ServiceResult<Supplier> {
        let mut supplier = Supplier::create(input, Utc::now())?;
        self.docs.insert(&mut supplier).await?;
        info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    pub async fn supplier(&self, name: &str) -> ServiceResult<Supplier> {
        self.docs
            .find_by::<Supplier>("name", name)
            .await?
            .ok_or_else(|| DomainError::not_found("supplier", name).into())
    }

    pub async fn list_suppliers(&self, search: Option<&str>, pagination: Pagination) -> ServiceResult<Page<Supplier>> {
        let mut query = Query::new().sort_asc("name").paginate(pagination);
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            query = query.contains("name", search);
        }
        Ok(self.docs.find(&query).await?)
    }
}
