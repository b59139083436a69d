//! Infrastructure layer: the document store and every service that does IO.
//!
//! Domain crates decide; this crate loads documents, serializes concurrent
//! writers with keyed locks, persists the results and logs what happened.

pub mod audit;
pub mod catalog;
pub mod error;
pub mod fulfillment;
pub mod ledger;
pub mod locks;
pub mod numbering;
pub mod parties;
pub mod services;
pub mod store;
pub mod transfer;
pub mod warehouses;
pub mod workflow;

pub use error::{ServiceError, ServiceResult};
pub use services::Services;
