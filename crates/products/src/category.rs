use serde::{Deserialize, Serialize};

use kardex_core::{DocumentId, DomainError, DomainResult, impl_document};

/// Product category. Products reference it by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: DocumentId,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(Category, "categories", ["name"]);

impl Category {
    pub fn new(name: impl Into<String>, description: Option<String>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        Ok(Self {
            id: DocumentId::new(),
            name,
            description,
            version: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_rejected() {
        assert!(Category::new("  ", None).is_err());
        assert_eq!(Category::new(" Ferretería ", None).unwrap().name, "Ferretería");
    }
}
