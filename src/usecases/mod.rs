//! Use Cases Layer - Application Logic
//!
//! Orchestrates the domain state machine with the transport port.
//!
//! Use cases:
//! - `LiveFeedClient`: connect/reconnect lifecycle and snapshot publishing
//! - `RetryTimer`: cancellable reconnect deadline

pub mod live_feed;
pub mod retry;

pub use live_feed::{FeedStats, FeedView, LiveFeedClient, StatsSample};
