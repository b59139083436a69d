use serde::{Deserialize, Serialize};

use kardex_core::{DocumentId, DomainError, DomainResult, impl_document};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: DocumentId,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub is_main: bool,
    pub is_active: bool,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(Warehouse, "warehouses", ["code"]);

impl Warehouse {
    pub fn new(code: impl Into<String>, name: impl Into<String>, is_main: bool) -> DomainResult<Self> {
        let code = code.into().trim().to_uppercase();
        let name = name.into();
        if code.is_empty() || name.trim().is_empty() {
            return Err(DomainError::validation("warehouse code and name are required"));
        }
        Ok(Self {
            id: DocumentId::new(),
            code,
            name,
            address: None,
            is_main,
            is_active: true,
            version: 0,
        })
    }

    /// Warehouses seeded on a fresh store: the main one first.
    pub fn defaults() -> Vec<Warehouse> {
        vec![
            Self {
                id: DocumentId::new(),
                code: "SL01".to_string(),
                name: "Almacén San Luis (Principal)".to_string(),
                address: Some("Av. San Luis 123".to_string()),
                is_main: true,
                is_active: true,
                version: 0,
            },
            Self {
                id: DocumentId::new(),
                code: "ATE01".to_string(),
                name: "Almacén Ate".to_string(),
                address: Some("Carretera Central Km 5".to_string()),
                is_main: false,
                is_active: true,
                version: 0,
            },
        ]
    }

    /// Fails unless the warehouse can receive stock.
    pub fn ensure_active(&self) -> DomainResult<()> {
        if !self.is_active {
            return Err(DomainError::validation(format!(
                "warehouse {} is inactive",
                self.code
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_default_is_main() {
        let defaults = Warehouse::defaults();
        assert_eq!(defaults.iter().filter(|w| w.is_main).count(), 1);
        assert_eq!(defaults[0].code, "SL01");
    }

    #[test]
    fn inactive_warehouse_is_rejected() {
        let mut w = Warehouse::new("ate02", "Anexo", false).unwrap();
        assert_eq!(w.code, "ATE02");
        w.is_active = false;
        assert!(w.ensure_active().is_err());
    }
}
