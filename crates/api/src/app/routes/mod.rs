use axum::{Router, routing::get};

pub mod audit;
pub mod common;
pub mod inventory;
pub mod purchasing;
pub mod sales;
pub mod system;

/// Router for every business endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/inventory", inventory::router())
        .nest("/purchasing", purchasing::router())
        .nest("/sales", sales::router())
        .route("/audit/stale-fulfillments", get(audit::stale_fulfillments))
}
