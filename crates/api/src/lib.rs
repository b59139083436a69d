//! HTTP API: configuration, routing and request/response mapping over the
//! infrastructure services.

pub mod app;
pub mod config;
