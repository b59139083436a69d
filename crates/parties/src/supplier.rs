use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{DocumentId, DomainError, DomainResult, impl_document};

use crate::contact::ContactInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub ruc: Option<String>,
    #[serde(flatten)]
    pub contact: ContactInfo,
}

/// Supplier, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: DocumentId,
    pub name: String,
    pub ruc: Option<String>,
    #[serde(flatten)]
    pub contact: ContactInfo,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(Supplier, "suppliers", ["name"]);

impl Supplier {
    pub fn create(input: NewSupplier, at: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        Ok(Self {
            id: DocumentId::new(),
            name,
            ruc: input.ruc.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            contact: input.contact,
            created_at: at,
            version: 0,
        })
    }
}
