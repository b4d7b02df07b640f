//! # ACB Server
//!
//! HTTP/JSON front for the ACB lending ledger: configuration loading,
//! the axum router and Prometheus metrics.

pub mod api;
pub mod config;
pub mod metrics;

pub use api::{router, ApiError, AppState};
pub use config::ServerConfig;
pub use metrics::ServerMetrics;
