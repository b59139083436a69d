//! Purchasing domain module.
//!
//! Purchase orders, the purchase invoices issued from them, and debit notes
//! against those invoices. Pure state machines: stock effects of a reception
//! are posted by the infra workflow through the stock ledger.

pub mod debit_note;
pub mod invoice;
pub mod order;

pub use debit_note::{DebitNote, DebitNoteReason};
pub use invoice::{PurchaseInvoice, ReceptionStatus};
pub use order::{OrderItem, PurchaseOrder, PurchaseOrderStatus};
