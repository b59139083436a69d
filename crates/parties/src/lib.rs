//! Parties domain module: customers (with delivery branches) and suppliers.
//!
//! Pure domain logic; uniqueness of RUC and supplier name is enforced by the
//! document store through each document's unique keys.

pub mod contact;
pub mod customer;
pub mod supplier;

pub use contact::ContactInfo;
pub use customer::{Customer, CustomerBranch, NewCustomer};
pub use supplier::{NewSupplier, Supplier};
