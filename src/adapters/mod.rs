//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies, and hosts the outward-facing consumers of the
//! feed projection.
//!
//! Adapter categories:
//! - `feeds`: WebSocket transport for the live race feed
//! - `metrics`: Prometheus export, health probes and snapshot endpoint
//! - `console`: log-based observer

pub mod console;
pub mod feeds;
pub mod metrics;
