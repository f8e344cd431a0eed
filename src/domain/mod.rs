//! Domain layer - Race snapshot model and connection lifecycle.
//!
//! Pure logic with no I/O (hexagonal architecture inner ring).
//! Everything here is testable in isolation.

pub mod link;
pub mod snapshot;

// Re-export core types for convenience
pub use link::{HandleId, Link, LinkAction, LinkInput, LinkState};
pub use snapshot::{
    Coordinates, DecodeError, Driver, DriverId, LapIndicator, Sectors, Snapshot, Weather,
};
