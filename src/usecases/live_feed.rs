//! Live Feed Client - Self-healing Snapshot Synchronization
//!
//! Owns one connection to the race feed endpoint and republishes the latest
//! decoded `Snapshot` plus a connected flag to any number of observers.
//!
//! Features:
//! - Single-writer actor: one task owns the link state machine, the
//!   transport handle and the retry timer; everything else talks to it
//!   through channels (no locks)
//! - Idempotent `connect()`, optional `disconnect()` that suppresses retries
//! - Auto-reconnect after a fixed delay on close; errors converge on close
//! - Malformed frames are dropped and counted; published state is untouched
//! - Observers read through `FeedView` (watch cells, never torn)

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::retry::{wait_for, RetryTimer};
use crate::config::FeedConfig;
use crate::domain::link::{HandleId, Link, LinkAction, LinkInput};
use crate::domain::snapshot::Snapshot;
use crate::ports::transport::{
    FeedTransport, SignalSender, TransportEvent, TransportHandle, TransportSignal,
};

/// Latest published snapshot; `None` until the first good frame.
pub type SharedSnapshot = Option<Arc<Snapshot>>;

/// Commands accepted by the client actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Connect,
    Disconnect,
}

/// Counters describing the client's activity since start.
#[derive(Debug, Default)]
pub struct FeedStats {
    /// Transport handles opened.
    handles_opened: AtomicU64,
    /// Text frames received from the current handle.
    messages_received: AtomicU64,
    /// Snapshots decoded and published.
    snapshots_published: AtomicU64,
    /// Frames discarded because they failed to decode.
    decode_failures: AtomicU64,
    /// Reconnect attempts scheduled.
    retries_scheduled: AtomicU64,
    /// Unix ms of the last publish, 0 if none.
    last_publish_ms: AtomicI64,
}

/// Plain copy of `FeedStats` at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSample {
    pub handles_opened: u64,
    pub messages_received: u64,
    pub snapshots_published: u64,
    pub decode_failures: u64,
    pub retries_scheduled: u64,
}

impl FeedStats {
    pub fn sample(&self) -> StatsSample {
        StatsSample {
            handles_opened: self.handles_opened.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
        }
    }

    /// Wall-clock time of the last published snapshot.
    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        match self.last_publish_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-only projection of the client handed to observers.
///
/// Cheap to clone. Reading never blocks the client and never observes a
/// partially applied snapshot.
#[derive(Debug, Clone)]
pub struct FeedView {
    snapshot_rx: watch::Receiver<SharedSnapshot>,
    connected_rx: watch::Receiver<bool>,
    stats: Arc<FeedStats>,
}

impl FeedView {
    /// Latest snapshot, if any has arrived.
    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Whether the transport last reported open.
    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<SharedSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Receiver notified whenever the connected flag flips.
    pub fn subscribe_connection(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }
}

/// Handle to a running live feed client.
///
/// Dropping every clone stops the actor and closes the connection.
#[derive(Debug, Clone)]
pub struct LiveFeedClient {
    commands: mpsc::UnboundedSender<Command>,
    view: FeedView,
}

impl LiveFeedClient {
    /// Spawn the client actor. Nothing connects until `connect()`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: &FeedConfig,
        transport: Arc<dyn FeedTransport>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (connected_tx, connected_rx) = watch::channel(false);
        let stats = Arc::new(FeedStats::default());

        let session = FeedSession {
            endpoint: config.endpoint.clone(),
            transport,
            link: Link::new(),
            handle: None,
            retry: RetryTimer::new(Duration::from_millis(config.reconnect_delay_ms)),
            signal_tx,
            snapshot_tx,
            connected_tx,
            stats: Arc::clone(&stats),
        };

        let task = tokio::spawn(session.run(command_rx, signal_rx, shutdown_rx));

        let client = Self {
            commands: command_tx,
            view: FeedView {
                snapshot_rx,
                connected_rx,
                stats,
            },
        };

        (client, task)
    }

    /// Open the connection unless one is already open or opening.
    ///
    /// Never blocks; the outcome is observable through `view()`.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    pub fn view(&self) -> FeedView {
        self.view.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!(?command, "Live feed client stopped — command dropped");
        }
    }
}

/// State owned by the actor task.
struct FeedSession {
    endpoint: String,
    transport: Arc<dyn FeedTransport>,
    link: Link,
    /// Current handle, tagged with its id.
    handle: Option<(HandleId, Box<dyn TransportHandle>)>,
    retry: RetryTimer,
    /// Cloned into every opened handle.
    signal_tx: SignalSender,
    snapshot_tx: watch::Sender<SharedSnapshot>,
    connected_tx: watch::Sender<bool>,
    stats: Arc<FeedStats>,
}

impl FeedSession {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut signals: mpsc::UnboundedReceiver<TransportSignal>,
        shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut shutdown_rx = Some(shutdown_rx);
        info!(
            reconnect_delay_ms = self.retry.delay().as_millis(),
            "Live feed client started"
        );

        loop {
            let deadline = self.retry.deadline();

            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown_rx) => {
                    info!("Shutdown signal in live feed client");
                    break;
                }
                command = commands.recv() => match command {
                    Some(Command::Connect) => self.apply(LinkInput::Connect),
                    Some(Command::Disconnect) => {
                        info!("Disconnect requested — auto-reconnect suppressed");
                        self.apply(LinkInput::Disconnect);
                    }
                    None => {
                        debug!("All client handles dropped");
                        break;
                    }
                },
                Some(signal) = signals.recv() => self.on_signal(signal),
                () = wait_for(deadline) => {
                    self.retry.fire();
                    info!("Reconnect delay elapsed, reconnecting");
                    self.apply(LinkInput::RetryElapsed);
                }
            }
        }

        self.apply(LinkInput::Disconnect);
        info!("Live feed client stopped");
    }

    fn on_signal(&mut self, signal: TransportSignal) {
        let TransportSignal { handle, event } = signal;

        match event {
            TransportEvent::Opened => {
                info!(%handle, "Live feed connected");
                self.apply(LinkInput::Opened(handle));
            }
            TransportEvent::Message(text) => self.on_message(handle, &text),
            TransportEvent::Failed(reason) => {
                warn!(%handle, %reason, "Live feed transport error — closing");
                self.apply(LinkInput::Failed(handle));
            }
            TransportEvent::Closed => {
                self.apply(LinkInput::Closed(handle));
            }
        }
    }

    /// Decode one frame and publish it, or drop it.
    fn on_message(&self, handle: HandleId, text: &str) {
        if !self.link.accepts_message(handle) {
            debug!(%handle, "Frame from inactive handle ignored");
            return;
        }
        FeedStats::bump(&self.stats.messages_received);

        match Snapshot::from_json(text) {
            Ok(snapshot) => {
                debug!(
                    race = %snapshot.race,
                    lap = %snapshot.lap,
                    drivers = snapshot.drivers.len(),
                    "Snapshot published"
                );
                self.snapshot_tx.send_replace(Some(Arc::new(snapshot)));
                FeedStats::bump(&self.stats.snapshots_published);
                self.stats
                    .last_publish_ms
                    .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
            }
            Err(e) => {
                FeedStats::bump(&self.stats.decode_failures);
                warn!(%handle, error = %e, bytes = text.len(), "Discarding malformed snapshot");
            }
        }
    }

    fn apply(&mut self, input: LinkInput) {
        let actions = self.link.apply(input);
        if actions.is_empty() {
            debug!(?input, state = ?self.link.state(), "No transition");
        }
        for action in actions {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: LinkAction) {
        match action {
            LinkAction::Open(id) => {
                let handle = self
                    .transport
                    .open(&self.endpoint, id, self.signal_tx.clone());
                self.handle = Some((id, handle));
                FeedStats::bump(&self.stats.handles_opened);
                info!(handle = %id, "Opening live feed connection");
            }
            LinkAction::Close(id) => {
                if let Some((_, handle)) =
                    self.handle.as_mut().filter(|(current, _)| *current == id)
                {
                    handle.close();
                }
            }
            LinkAction::Release(id) => {
                if self.handle.as_ref().is_some_and(|(current, _)| *current == id) {
                    self.handle = None;
                }
            }
            LinkAction::ScheduleRetry => {
                if self.retry.arm() {
                    FeedStats::bump(&self.stats.retries_scheduled);
                    warn!(
                        delay_ms = self.retry.delay().as_millis(),
                        "Live feed disconnected, retrying"
                    );
                }
            }
            LinkAction::CancelRetry => {
                if self.retry.cancel() {
                    debug!("Pending reconnect cancelled");
                }
            }
            LinkAction::PublishConnected(connected) => {
                self.connected_tx.send_if_modified(|current| {
                    if *current == connected {
                        false
                    } else {
                        *current = connected;
                        true
                    }
                });
            }
        }
    }
}

/// Resolves on a shutdown broadcast. Once every sender is gone the branch
/// pends forever and the client runs until its handles are dropped.
async fn shutdown_requested(shutdown_rx: &mut Option<broadcast::Receiver<()>>) {
    loop {
        let Some(receiver) = shutdown_rx.as_mut() else {
            return std::future::pending().await;
        };
        match receiver.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => return,
            Err(RecvError::Closed) => {
                debug!("Shutdown channel closed, ignoring it from now on");
                *shutdown_rx = None;
            }
        }
    }
}
