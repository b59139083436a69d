//! Products domain module.
//!
//! Catalog documents and the stock/cost fields the ledger maintains on them,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod product;

pub use category::Category;
pub use product::{Measurement, NewProduct, Product, ProductChanges};
