//! Feed Transport Port - Callback-style Connection Interface
//!
//! Defines what the live feed client needs from a streaming transport:
//! open a handle to an endpoint without blocking, receive its lifecycle
//! events (open, message, error, close) tagged with the handle's id, and
//! ask it to close. Adapters implement this over WebSockets; tests
//! implement it with scripted fakes.
//!
//! Contract for implementors:
//! - `open` returns immediately; the connection is established in the
//!   background and reported with `TransportEvent::Opened`.
//! - Every handle emits exactly one `TransportEvent::Closed`, after which it
//!   emits nothing. A failure is reported as `Failed` and is followed by
//!   `Closed` (either on its own or after `close()` is called).
//! - Dropping a handle closes it.

use tokio::sync::mpsc;

use crate::domain::link::HandleId;

/// Lifecycle event emitted by a transport handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established.
    Opened,
    /// One inbound text frame.
    Message(String),
    /// Transport-level failure (refused, dropped, protocol error).
    Failed(String),
    /// Connection closed; terminal for the handle.
    Closed,
}

/// An event together with the handle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSignal {
    pub handle: HandleId,
    pub event: TransportEvent,
}

impl TransportSignal {
    pub const fn new(handle: HandleId, event: TransportEvent) -> Self {
        Self { handle, event }
    }
}

/// Sender half handed to transports for event delivery.
pub type SignalSender = mpsc::UnboundedSender<TransportSignal>;

/// A live (or opening) connection owned by the client.
pub trait TransportHandle: Send {
    /// Request the connection to close. Idempotent.
    fn close(&mut self);
}

/// Factory for transport handles.
pub trait FeedTransport: Send + Sync + 'static {
    /// Start connecting to `endpoint` and report lifecycle events for
    /// handle `id` on `signals`.
    fn open(&self, endpoint: &str, id: HandleId, signals: SignalSender) -> Box<dyn TransportHandle>;
}
