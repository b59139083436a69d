//! Document Store Adapter.
//!
//! A collection-oriented JSON store with versioned saves, unique business keys
//! and atomic counters. Services use it through [`Documents`]; backends are
//! [`InMemoryDocumentStore`] (tests/dev) and [`PostgresDocumentStore`].

pub mod documents;
pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use documents::Documents;
pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::{Condition, Page, Pagination, Query, Sort};
pub use r#trait::{DocumentStore, RawDocument, StoreError, UniqueKey, WriteOp};
