//! In-process keyed mutual exclusion.
//!
//! Serializes read-modify-write cycles on the same business key (a SKU, an
//! invoice number) across concurrent requests in this process. Version-checked
//! saves still catch writers in other processes.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub type KeyGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop slots nobody holds or waits on.
        if slots.len() > 1024 {
            slots.retain(|_, m| Arc::strong_count(m) > 1);
        }
        slots.entry(key.to_string()).or_default().clone()
    }

    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.slot(key).lock_owned().await
    }

    /// Lock several keys in sorted order, so two callers locking overlapping
    /// sets cannot deadlock. Duplicates are locked once.
    pub async fn lock_many<I, K>(&self, keys: I) -> Vec<KeyGuard>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let ordered: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            guards.push(self.lock(&key).await);
        }
        guards
    }
}

/// Lock key for a product's stock.
pub fn sku_key(sku: &str) -> String {
    format!("sku:{sku}")
}

/// Lock key for a numbered document (order, invoice).
pub fn document_key(number: &str) -> String {
    format!("doc:{number}")
}
