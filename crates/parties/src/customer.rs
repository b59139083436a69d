use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{DocumentId, DomainError, DomainResult, impl_document};

use crate::contact::ContactInfo;

/// A delivery location of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerBranch {
    pub branch_name: String,
    pub address: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CustomerBranch {
    pub fn new(branch_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
            address: address.into(),
            contact_person: None,
            phone: None,
            is_main: false,
            is_active: true,
        }
    }

    pub fn main(mut self) -> Self {
        self.is_main = true;
        self
    }

    fn is_named(&self, name: &str) -> bool {
        self.branch_name.trim().eq_ignore_ascii_case(name.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub ruc: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub branches: Vec<CustomerBranch>,
}

/// Customer, keyed by RUC.
///
/// The branch list is only mutated through the setters below, which keep two
/// invariants: at most one main branch, and at least one active branch whenever
/// the list is non-empty. A rejected mutation leaves the list untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: DocumentId,
    pub name: String,
    pub ruc: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
    branches: Vec<CustomerBranch>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: u64,
}

impl_document!(Customer, "customers", ["ruc"]);

impl Customer {
    pub fn create(input: NewCustomer, at: DateTime<Utc>) -> DomainResult<Self> {
        let ruc = input.ruc.trim().to_string();
        if ruc.is_empty() {
            return Err(DomainError::validation("RUC cannot be empty"));
        }
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        validate_branches(&input.branches)?;

        Ok(Self {
            id: DocumentId::new(),
            name: input.name.trim().to_string(),
            ruc,
            contact: input.contact,
            branches: input.branches,
            created_at: at,
            version: 0,
        })
    }

    pub fn branches(&self) -> &[CustomerBranch] {
        &self.branches
    }

    pub fn main_branch(&self) -> Option<&CustomerBranch> {
        self.branches.iter().find(|b| b.is_main)
    }

    pub fn active_branch(&self, name: &str) -> Option<&CustomerBranch> {
        self.branches.iter().find(|b| b.is_active && b.is_named(name))
    }

    /// Add a branch. Adding a main branch demotes the current one.
    pub fn add_branch(&mut self, branch: CustomerBranch) -> DomainResult<()> {
        self.mutate_branches(|branches| {
            if branch.is_main {
                branches.iter_mut().for_each(|b| b.is_main = false);
            }
            branches.push(branch);
            Ok(())
        })
    }

    pub fn set_main_branch(&mut self, name: &str) -> DomainResult<()> {
        self.mutate_branches(|branches| {
            let target = branches
                .iter()
                .position(|b| b.is_named(name))
                .ok_or_else(|| DomainError::not_found("branch", name))?;
            if !branches[target].is_active {
                return Err(DomainError::validation(format!(
                    "branch '{name}' is inactive and cannot be main"
                )));
            }
            for (idx, b) in branches.iter_mut().enumerate() {
                b.is_main = idx == target;
            }
            Ok(())
        })
    }

    /// Deactivating a branch also drops its main flag.
    pub fn deactivate_branch(&mut self, name: &str) -> DomainResult<()> {
        self.mutate_branches(|branches| {
            let branch = branches
                .iter_mut()
                .find(|b| b.is_named(name))
                .ok_or_else(|| DomainError::not_found("branch", name))?;
            branch.is_active = false;
            branch.is_main = false;
            Ok(())
        })
    }

    pub fn activate_branch(&mut self, name: &str) -> DomainResult<()> {
        self.mutate_branches(|branches| {
            let branch = branches
                .iter_mut()
                .find(|b| b.is_named(name))
                .ok_or_else(|| DomainError::not_found("branch", name))?;
            branch.is_active = true;
            Ok(())
        })
    }

    pub fn replace_branches(&mut self, branches: Vec<CustomerBranch>) -> DomainResult<()> {
        self.mutate_branches(|current| {
            *current = branches;
            Ok(())
        })
    }

    /// Where a sales order ships to: the named active branch, else the explicit
    /// address, else the main branch, else the customer's own address.
    pub fn delivery_address(
        &self,
        branch_name: Option<&str>,
        explicit: Option<&str>,
    ) -> DomainResult<Option<String>> {
        if let Some(name) = branch_name {
            return self
                .active_branch(name)
                .map(|b| Some(b.address.clone()))
                .ok_or_else(|| {
                    DomainError::validation(format!(
                        "customer {} has no active branch named '{name}'",
                        self.ruc
                    ))
                });
        }
        if let Some(address) = explicit.filter(|a| !a.trim().is_empty()) {
            return Ok(Some(address.to_string()));
        }
        Ok(self
            .main_branch()
            .filter(|b| b.is_active)
            .map(|b| b.address.clone())
            .or_else(|| self.contact.address.clone()))
    }

    fn mutate_branches<F>(&mut self, f: F) -> DomainResult<()>
    where
        F: FnOnce(&mut Vec<CustomerBranch>) -> DomainResult<()>,
    {
        let mut candidate = self.branches.clone();
        f(&mut candidate)?;
        validate_branches(&candidate)?;
        self.branches = candidate;
        Ok(())
    }
}

fn validate_branches(branches: &[CustomerBranch]) -> DomainResult<()> {
    if branches.iter().any(|b| b.branch_name.trim().is_empty()) {
        return Err(DomainError::validation("branch name cannot be empty"));
    }
    for (idx, b) in branches.iter().enumerate() {
        if branches[..idx].iter().any(|other| other.is_named(&b.branch_name)) {
            return Err(DomainError::validation(format!(
                "duplicate branch '{}'",
                b.branch_name
            )));
        }
    }
    if branches.iter().filter(|b| b.is_main).count() > 1 {
        return Err(DomainError::validation("only one branch can be main"));
    }
    if !branches.is_empty() && !branches.iter().any(|b| b.is_active) {
        return Err(DomainError::validation("at least one branch must stay active"));
    }
    Ok(())
}
