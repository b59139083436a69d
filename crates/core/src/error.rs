//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Business failures only: callers are expected to recover from these at the
/// workflow boundary and render them. Store outages and other infrastructure
/// failures live in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced document does not exist.
    #[error("{entity} '{key}' not found")]
    NotFound { entity: String, key: String },

    /// A business rule was violated (double invoicing, overpayment, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An outbound movement asked for more units than are on hand.
    #[error("insufficient stock for {sku}: available {available}, required {required}")]
    InsufficientStock {
        sku: String,
        available: i64,
        required: i64,
    },

    /// A unique business key is already taken.
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        entity: String,
        field: String,
        value: String,
    },

    /// A concurrent writer changed the document between read and save.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn insufficient_stock(sku: impl Into<String>, available: i64, required: i64) -> Self {
        Self::InsufficientStock {
            sku: sku.into(),
            available,
            required,
        }
    }

    pub fn duplicate(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Duplicate {
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::Validation(_) => "VALIDATION_ERROR",
            DomainError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            DomainError::Duplicate { .. } => "DUPLICATE_ENTITY",
            DomainError::Conflict(_) => "CONFLICT",
        }
    }
}
