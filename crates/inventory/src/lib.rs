//! Inventory domain module.
//!
//! Business rules for the stock ledger (kardex), implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): movement
//! classification, posting, weighted-average valuation, delivery guides and
//! warehouses.

pub mod guide;
pub mod ledger;
pub mod loss;
pub mod movement;
pub mod valuation;
pub mod warehouse;

pub use guide::{DeliveryGuide, GuideItem, GuideStatus, GuideType};
pub use ledger::{Posting, aggregate_demand, check_availability, net_quantity, post};
pub use loss::LossSummary;
pub use movement::{Direction, MovementRequest, MovementType, StockMovement};
pub use valuation::weighted_average_cost;
pub use warehouse::Warehouse;
