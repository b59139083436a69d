//! Sales domain module.
//!
//! Sales orders, the sales invoices issued from them, and credit notes against
//! those invoices. Pure state machines: the dispatch and return stock effects
//! are posted by the infra workflow through the stock ledger.

pub mod credit_note;
pub mod invoice;
pub mod order;

pub use credit_note::{CreditNote, CreditNoteReason};
pub use invoice::{DispatchStatus, SalesInvoice};
pub use order::{SalesLine, SalesOrder, SalesOrderStatus};
