//! Feed Link State Machine - Transport Lifecycle Transition Table
//!
//! Pure model of one feed connection's lifecycle. The client feeds it
//! lifecycle inputs (connect requests, transport open/close/error events,
//! retry deadlines) and executes the returned `LinkAction`s. Keeping the
//! table here, free of I/O, makes illegal combinations such as "connected
//! with no handle" unrepresentable and lets the table be tested directly.
//!
//! Every transport handle is tagged with a `HandleId`. Events carrying an id
//! other than the current one come from a released handle and are ignored.

use std::fmt;

/// Monotonic tag for one opened transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No handle. A retry may be pending.
    Disconnected,
    /// Handle opened, waiting for the transport's open event.
    Connecting(HandleId),
    /// Transport reported open; messages are accepted.
    Connected(HandleId),
    /// Handle errored and was asked to close; waiting for its close event.
    Closing(HandleId),
}

/// Inputs driving the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkInput {
    /// Caller invoked `connect()`.
    Connect,
    /// The reconnect timer elapsed.
    RetryElapsed,
    /// Caller invoked `disconnect()`.
    Disconnect,
    Opened(HandleId),
    Failed(HandleId),
    Closed(HandleId),
}

/// Side effects the owner of the link must perform, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Open a new transport handle tagged with this id.
    Open(HandleId),
    /// Ask the handle to close; it stays owned until released.
    Close(HandleId),
    /// Drop the handle.
    Release(HandleId),
    ScheduleRetry,
    CancelRetry,
    /// Publish the connected flag to observers.
    PublishConnected(bool),
}

/// Connection lifecycle with its handle id allocator.
#[derive(Debug)]
pub struct Link {
    state: LinkState,
    next_id: u64,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    /// Create a link in `Disconnected`.
    pub const fn new() -> Self {
        Self {
            state: LinkState::Disconnected,
            next_id: 1,
        }
    }

    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Whether the transport last reported open.
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected(_))
    }

    /// Id of the handle currently owned, if any.
    pub const fn current_handle(&self) -> Option<HandleId> {
        match self.state {
            LinkState::Disconnected => None,
            LinkState::Connecting(id) | LinkState::Connected(id) | LinkState::Closing(id) => {
                Some(id)
            }
        }
    }

    /// Messages are only accepted from the current handle once open.
    pub fn accepts_message(&self, id: HandleId) -> bool {
        self.state == LinkState::Connected(id)
    }

    /// Apply one input and return the actions it requires.
    pub fn apply(&mut self, input: LinkInput) -> Vec<LinkAction> {
        use LinkAction as A;
        use LinkState as S;

        match (self.state, input) {
            (S::Disconnected, LinkInput::Connect | LinkInput::RetryElapsed) => {
                let id = self.allocate();
                self.state = S::Connecting(id);
                vec![A::CancelRetry, A::Open(id)]
            }
            (S::Closing(old), LinkInput::Connect | LinkInput::RetryElapsed) => {
                let id = self.allocate();
                self.state = S::Connecting(id);
                vec![A::Release(old), A::CancelRetry, A::Open(id)]
            }
            (S::Connecting(_) | S::Connected(_), LinkInput::Connect | LinkInput::RetryElapsed) => {
                Vec::new()
            }

            (S::Connecting(current), LinkInput::Opened(id)) if id == current => {
                self.state = S::Connected(id);
                vec![A::PublishConnected(true)]
            }

            (S::Connecting(current) | S::Connected(current), LinkInput::Failed(id))
                if id == current =>
            {
                self.state = S::Closing(id);
                vec![A::Close(id), A::PublishConnected(false)]
            }

            (
                S::Connecting(current) | S::Connected(current) | S::Closing(current),
                LinkInput::Closed(id),
            ) if id == current => {
                self.state = S::Disconnected;
                vec![A::Release(id), A::PublishConnected(false), A::ScheduleRetry]
            }

            (S::Disconnected, LinkInput::Disconnect) => {
                vec![A::CancelRetry, A::PublishConnected(false)]
            }
            (
                S::Connecting(id) | S::Connected(id) | S::Closing(id),
                LinkInput::Disconnect,
            ) => {
                self.state = S::Disconnected;
                vec![
                    A::Close(id),
                    A::Release(id),
                    A::CancelRetry,
                    A::PublishConnected(false),
                ]
            }

            // Stale handles, a second error while closing, or an open
            // event for a handle that is no longer connecting.
            _ => Vec::new(),
        }
    }

    fn allocate(&mut self) -> HandleId {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        id
    }
}
