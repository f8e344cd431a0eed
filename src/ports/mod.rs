//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) the feed client requires from the
//! outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `FeedTransport`: callback-style streaming connection

pub mod transport;
