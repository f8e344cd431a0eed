//! Reconnect Timer - Single Cancellable Retry Deadline
//!
//! Owned by the live feed actor. At most one retry is pending at a time:
//! arming an armed timer keeps the original deadline, and cancelling drops
//! it. The actor awaits `wait()` as one branch of its `tokio::select!`.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Fixed-delay, cancellable reconnect deadline.
#[derive(Debug)]
pub struct RetryTimer {
    /// Delay between a close and the next attempt.
    delay: Duration,
    /// Pending deadline, if armed.
    deadline: Option<Instant>,
}

impl RetryTimer {
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Schedule a retry `delay` from now.
    ///
    /// Returns `false` (and keeps the existing deadline) if already armed.
    pub fn arm(&mut self) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + self.delay);
        true
    }

    /// Drop any pending retry. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Current deadline, copied out so `select!` branches need no borrow.
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Mark the pending retry as consumed.
    pub fn fire(&mut self) {
        self.deadline = None;
    }
}

/// Resolve at `deadline`, or never when there is none.
pub async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
