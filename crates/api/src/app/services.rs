use std::sync::Arc;

use tracing::info;

use kardex_infra::store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use kardex_infra::{ServiceResult, Services};

use crate::config::{StoreBackend, StoreConfig};

/// The service graph the handlers share. The backend is picked at startup.
pub type AppServices = Services<Arc<dyn DocumentStore>>;

/// Open the configured store, build every service over it and seed the
/// default warehouses.
pub async fn build_services(config: &StoreConfig) -> ServiceResult<AppServices> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
        StoreBackend::Postgres => {
            let url = config.url.as_deref().unwrap_or_default();
            Arc::new(PostgresDocumentStore::connect(url, config.max_connections).await?)
        }
    };
    let services = Services::new(store);
    let seeded = services.warehouses.seed_defaults().await?;
    info!(backend = ?config.backend, seeded, "services ready");
    Ok(services)
}
