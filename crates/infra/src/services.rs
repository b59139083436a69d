use std::sync::Arc;

use crate::audit::AuditService;
use crate::catalog::CatalogService;
use crate::fulfillment::GuideGenerator;
use crate::ledger::LedgerEngine;
use crate::locks::KeyedLocks;
use crate::numbering::NumberingService;
use crate::parties::PartyService;
use crate::store::{DocumentStore, Documents};
use crate::transfer::TransferService;
use crate::warehouses::WarehouseService;
use crate::workflow::{PurchasingWorkflow, SalesWorkflow};

/// Every service over one store, sharing one set of keyed locks.
///
/// Built once at process start; the store handle is the only shared resource.
pub struct Services<S> {
    pub ledger: LedgerEngine<S>,
    pub numbering: NumberingService<S>,
    pub guides: GuideGenerator<S>,
    pub catalog: CatalogService<S>,
    pub parties: PartyService<S>,
    pub warehouses: WarehouseService<S>,
    pub transfers: TransferService<S>,
    pub purchasing: PurchasingWorkflow<S>,
    pub sales: SalesWorkflow<S>,
    pub audit: AuditService<S>,
}

impl<S: Clone> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            numbering: self.numbering.clone(),
            guides: self.guides.clone(),
            catalog: self.catalog.clone(),
            parties: self.parties.clone(),
            warehouses: self.warehouses.clone(),
            transfers: self.transfers.clone(),
            purchasing: self.purchasing.clone(),
            sales: self.sales.clone(),
            audit: self.audit.clone(),
        }
    }
}

impl<S: DocumentStore + Clone> Services<S> {
    pub fn new(store: S) -> Self {
        let docs = Documents::new(store);
        let locks = Arc::new(KeyedLocks::new());
        let ledger = LedgerEngine::new(docs.clone(), locks.clone());
        Self {
            numbering: NumberingService::new(docs.clone()),
            guides: GuideGenerator::new(docs.clone(), ledger.clone()),
            catalog: CatalogService::new(docs.clone(), locks.clone()),
            parties: PartyService::new(docs.clone(), locks.clone()),
            warehouses: WarehouseService::new(docs.clone()),
            transfers: TransferService::new(docs.clone(), locks.clone()),
            purchasing: PurchasingWorkflow::new(docs.clone(), locks.clone()),
            sales: SalesWorkflow::new(docs.clone(), locks),
            audit: AuditService::new(docs, ledger.clone()),
            ledger,
        }
    }
}
