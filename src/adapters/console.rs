//! Console Observer - Log-based Feed Consumer
//!
//! Headless stand-in for the dashboard view layer: subscribes to the feed
//! projection and logs each new snapshot summary and every connectivity
//! change. Tolerates an unset snapshot and absent optional fields.

use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::usecases::live_feed::FeedView;

/// Logs snapshot and connection changes until shutdown.
pub struct ConsoleObserver {
    view: FeedView,
}

impl ConsoleObserver {
    pub const fn new(view: FeedView) -> Self {
        Self { view }
    }

    #[instrument(skip_all)]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut snapshots = self.view.subscribe_snapshots();
        let mut connection = self.view.subscribe_connection();

        if self.view.snapshot().is_none() {
            info!("Waiting for live timing data");
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                changed = connection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if *connection.borrow_and_update() {
                        info!("Live timing connected");
                    } else {
                        warn!("Live timing disconnected — showing last known data");
                    }
                }
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let latest = snapshots.borrow_and_update().clone();
                    if let Some(snapshot) = latest {
                        info!(
                            drivers = snapshot.drivers.len(),
                            summary = %snapshot.summary(),
                            "Race update"
                        );
                    }
                }
            }
        }
    }
}
