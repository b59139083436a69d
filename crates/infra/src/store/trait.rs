use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use kardex_core::{DocumentId, ExpectedVersion};

use super::query::{Page, Query};

/// A stored document as the backend sees it: id, store-managed version, JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: DocumentId,
    pub version: u64,
    pub body: JsonValue,
}

/// A business key value that must be unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub field: String,
    pub value: String,
}

/// Document store operation error.
///
/// These are **infrastructure errors**. Two of them carry business meaning and
/// are translated by the service layer: a unique key collision becomes
/// `DomainError::Duplicate`, a version mismatch becomes `DomainError::Conflict`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {collection}.{field} '{value}'")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("document serialization failed: {0}")]
    Serialization(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One write of an atomic [`DocumentStore::write_all`] batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert {
        collection: String,
        id: DocumentId,
        body: JsonValue,
        unique_keys: Vec<UniqueKey>,
    },
    Save {
        collection: String,
        id: DocumentId,
        body: JsonValue,
        expected: ExpectedVersion,
        unique_keys: Vec<UniqueKey>,
    },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Collection-oriented JSON document store.
///
/// ## Versions
///
/// Every document carries a store-managed version: 1 after `insert`, +1 per
/// `save`. `save` with [`ExpectedVersion::Exact`] fails with
/// [`StoreError::Concurrency`] when the stored version differs, which is how
/// read-modify-write cycles detect a concurrent writer.
///
/// ## Unique keys
///
/// `insert` and `save` receive the document's business keys. A key value held
/// by another document of the same collection fails the write with
/// [`StoreError::DuplicateKey`] and leaves the store unchanged.
///
/// ## Batches
///
/// `write_all` applies several inserts and saves as one unit: every write
/// lands, or the first failure is returned and none of them is visible.
///
/// ## Counters
///
/// `atomic_increment` is a single read-modify-write in the backend: concurrent
/// callers always observe distinct values.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &Query) -> Result<Page<RawDocument>, StoreError>;

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<RawDocument>, StoreError>;

    /// Insert a new document; returns its version (1).
    async fn insert(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError>;

    /// Replace an existing document; returns the new version.
    async fn save(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        expected: ExpectedVersion,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError>;

    /// Apply `ops` all-or-nothing; returns the new versions in `ops` order.
    async fn write_all(&self, ops: Vec<WriteOp>) -> Result<Vec<u64>, StoreError>;

    /// Remove a document; `false` when it did not exist.
    async fn delete(&self, collection: &str, id: DocumentId) -> Result<bool, StoreError>;

    /// Increment the counter `(collection, key, field)` and return the new value.
    /// Counters start at zero, so the first call returns 1.
    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn find(&self, collection: &str, query: &Query) -> Result<Page<RawDocument>, StoreError> {
        (**self).find(collection, query).await
    }

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<RawDocument>, StoreError> {
        (**self).get(collection, id).await
    }

    async fn insert(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError> {
        (**self).insert(collection, id, body, unique_keys).await
    }

    async fn save(
        &self,
        collection: &str,
        id: DocumentId,
        body: JsonValue,
        expected: ExpectedVersion,
        unique_keys: &[UniqueKey],
    ) -> Result<u64, StoreError> {
        (**self).save(collection, id, body, expected, unique_keys).await
    }

    async fn write_all(&self, ops: Vec<WriteOp>) -> Result<Vec<u64>, StoreError> {
        (**self).write_all(ops).await
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<bool, StoreError> {
        (**self).delete(collection, id).await
    }

    async fn atomic_increment(&self, collection: &str, key: &str, field: &str) -> Result<i64, StoreError> {
        (**self).atomic_increment(collection, key, field).await
    }
}
