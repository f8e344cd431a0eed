//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export and health/snapshot endpoints
//! (/live, /ready, /snapshot) via axum 0.7.

pub mod health;
pub mod prometheus;

pub use health::HealthServer;
pub use prometheus::MetricsRegistry;
