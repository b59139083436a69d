//! `kardex-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error taxonomy, document identity and versioning, and the money value object.

pub mod document;
pub mod error;
pub mod id;
pub mod value_object;

pub use document::{Document, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::DocumentId;
pub use value_object::{Amount, ValueObject, add_quantities, round3};
