//! Persisted document contract and optimistic concurrency.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{DomainError, DomainResult};
use crate::id::DocumentId;

/// A domain document that lives in one collection of the document store.
///
/// The store owns `version`: it is 1 after insert and grows by one per save.
/// Documents carry it in memory (never in the serialized body) so the next save
/// can be version-checked against what was read.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the document is stored in.
    const COLLECTION: &'static str;

    /// Dotted field paths whose values must be unique within the collection.
    const UNIQUE_KEYS: &'static [&'static str] = &[];

    fn id(&self) -> DocumentId;

    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

/// Implements [`Document`] for a struct with `id: DocumentId` and `version: u64` fields.
#[macro_export]
macro_rules! impl_document {
    ($t:ty, $collection:literal) => {
        $crate::impl_document!($t, $collection, []);
    };
    ($t:ty, $collection:literal, [$($key:literal),* $(,)?]) => {
        impl $crate::Document for $t {
            const COLLECTION: &'static str = $collection;
            const UNIQUE_KEYS: &'static [&'static str] = &[$($key),*];

            fn id(&self) -> $crate::DocumentId {
                self.id
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

/// Optimistic concurrency expectation for a document save.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (idempotent overwrites, seeding).
    Any,
    /// Require the stored document to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
