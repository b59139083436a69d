//! Invoicing building blocks shared by purchasing and sales.
//!
//! Both sides settle an invoice the same way: payments against an amount due
//! that credit notes lower and debit notes raise. Line items differ in naming
//! (unit cost vs unit price) and meet here through [`InvoiceLine`].

pub mod line;
pub mod settlement;

pub use line::{InvoiceLine, lines_total, validate_lines};
pub use settlement::{Payment, PaymentStatus, Settlement};
