//! Warehouses: seeded defaults and lookups.

use tracing::{debug, info};

use kardex_core::DomainError;
use kardex_inventory::Warehouse;

use crate::error::{ServiceError, ServiceResult};
use crate::store::{DocumentStore, Documents, Query};

#[derive(Debug, Clone)]
pub struct WarehouseService<S> {
    docs: Documents<S>,
}

impl<S: DocumentStore> WarehouseService<S> {
    pub fn new(docs: Documents<S>) -> Self {
        Self { docs }
    }

    /// Insert the default warehouses that are not there yet. Safe to run on
    /// every start.
    pub async fn seed_defaults(&self) -> ServiceResult<usize> {
        let mut inserted = 0;
        for mut warehouse in Warehouse::defaults() {
            match self.docs.insert(&mut warehouse).await.map_err(ServiceError::from) {
                Ok(()) => inserted += 1,
                Err(ServiceError::Domain(DomainError::Duplicate { .. })) => {
                    debug!(code = %warehouse.code, "warehouse already present");
                }
                Err(err) => return Err(err),
            }
        }
        if inserted > 0 {
            info!(inserted, "default warehouses seeded");
        }
        Ok(inserted)
    }

    pub async fn active_warehouses(&self) -> ServiceResult<Vec<Warehouse>> {
        Ok(self
            .docs
            .find_all(Query::new().eq("is_active", true).sort_asc("code"))
            .await?)
    }

    pub async fn by_code(&self, code: &str) -> ServiceResult<Warehouse> {
        let code = code.trim().to_uppercase();
        self.docs
            .find_by::<Warehouse>("code", code.as_str())
            .await?
            .ok_or_else(|| DomainError::not_found("warehouse", code).into())
    }

    /// The warehouse stock leaves from on transfers.
    pub async fn main(&self) -> ServiceResult<Warehouse> {
        self.docs
            .find_by::<Warehouse>("is_main", true)
            .await?
            .ok_or_else(|| DomainError::not_found("warehouse", "main").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryDocumentStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn seeding_twice_inserts_once() {
        let service = WarehouseService::new(Documents::new(Arc::new(InMemoryDocumentStore::new())));
        assert_eq!(service.seed_defaults().await.unwrap(), 2);
        assert_eq!(service.seed_defaults().await.unwrap(), 0);

        let active = service.active_warehouses().await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(service.main().await.unwrap().code, "SL01");
        assert_eq!(service.by_code("ate01").await.unwrap().code, "ATE01");
    }
}
