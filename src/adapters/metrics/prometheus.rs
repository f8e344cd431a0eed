//! Prometheus Metrics Registry - Feed Observability
//!
//! Registers feed gauges and exposes them on /metrics. Values are sampled
//! from `FeedStats` at scrape time, so the client itself never touches the
//! registry.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::usecases::live_feed::FeedView;

/// Centralized Prometheus metrics for the feed client.
///
/// All metrics follow the naming convention `racefeed_*`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Feed being observed.
    view: FeedView,
    /// Connection status (1 = connected, 0 = disconnected).
    pub connected: IntGauge,
    /// Transport handles opened since start.
    pub handles_opened: IntGauge,
    /// Text frames received from the live handle since start.
    pub messages_received: IntGauge,
    /// Snapshots decoded and published since start.
    pub snapshots_published: IntGauge,
    /// Frames discarded as malformed since start.
    pub decode_failures: IntGauge,
    /// Reconnects scheduled since start.
    pub retries_scheduled: IntGauge,
    /// Seconds since the last published snapshot (-1 before the first).
    pub snapshot_age_seconds: Gauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new(view: FeedView) -> anyhow::Result<Self> {
        let registry = Registry::new();

        let connected = IntGauge::new(
            "racefeed_connected",
            "Feed connection status (1=connected, 0=disconnected)",
        )?;
        let handles_opened = IntGauge::new(
            "racefeed_handles_opened",
            "Transport handles opened since start",
        )?;
        let messages_received = IntGauge::new(
            "racefeed_messages_received",
            "Text frames received from the live connection since start",
        )?;
        let snapshots_published = IntGauge::new(
            "racefeed_snapshots_published",
            "Snapshots decoded and published since start",
        )?;
        let decode_failures = IntGauge::new(
            "racefeed_decode_failures",
            "Inbound frames discarded as malformed since start",
        )?;
        let retries_scheduled = IntGauge::new(
            "racefeed_retries_scheduled",
            "Reconnect attempts scheduled since start",
        )?;
        let snapshot_age_seconds = Gauge::new(
            "racefeed_snapshot_age_seconds",
            "Seconds since the last published snapshot (-1 if none)",
        )?;

        registry.register(Box::new(connected.clone()))?;
        registry.register(Box::new(handles_opened.clone()))?;
        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(snapshots_published.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;
        registry.register(Box::new(retries_scheduled.clone()))?;
        registry.register(Box::new(snapshot_age_seconds.clone()))?;

        Ok(Self {
            registry,
            view,
            connected,
            handles_opened,
            messages_received,
            snapshots_published,
            decode_failures,
            retries_scheduled,
            snapshot_age_seconds,
        })
    }

    /// Copy the current feed stats into the gauges.
    pub fn refresh(&self) {
        let stats = self.view.stats().sample();
        self.connected.set(i64::from(self.view.is_connected()));
        self.handles_opened.set(saturating_i64(stats.handles_opened));
        self.messages_received
            .set(saturating_i64(stats.messages_received));
        self.snapshots_published
            .set(saturating_i64(stats.snapshots_published));
        self.decode_failures.set(saturating_i64(stats.decode_failures));
        self.retries_scheduled
            .set(saturating_i64(stats.retries_scheduled));

        let age = self.view.stats().last_snapshot_at().map_or(-1.0, |at| {
            (Utc::now() - at).num_milliseconds() as f64 / 1000.0
        });
        self.snapshot_age_seconds.set(age);
    }

    /// Refresh and encode in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        self.refresh();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics_self);
                async move {
                    metrics.render().map_err(|e| {
                        warn!(error = %e, "Failed to encode metrics");
                        StatusCode::INTERNAL_SERVER_ERROR
                    })
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::domain::link::HandleId;
    use crate::ports::transport::{
        FeedTransport, SignalSender, TransportEvent, TransportHandle, TransportSignal,
    };
    use crate::usecases::live_feed::LiveFeedClient;

    const PAYLOAD: &str = r#"{"race":"Test GP","lap":1,"drivers":[{"id":"max_verstappen","position":1,"lapTime":"1:20.000","winProbability":90}]}"#;

    /// Opens at once, then sends one good and one broken frame.
    struct ChattyTransport;

    struct NoopHandle;

    impl TransportHandle for NoopHandle {
        fn close(&mut self) {}
    }

    impl FeedTransport for ChattyTransport {
        fn open(&self, _: &str, id: HandleId, signals: SignalSender) -> Box<dyn TransportHandle> {
            for event in [
                TransportEvent::Opened,
                TransportEvent::Message(PAYLOAD.to_string()),
                TransportEvent::Message("{".to_string()),
            ] {
                let _ = signals.send(TransportSignal::new(id, event));
            }
            Box::new(NoopHandle)
        }
    }

    fn spawn_client() -> (LiveFeedClient, broadcast::Sender<()>) {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (client, _task) = LiveFeedClient::spawn(
            &FeedConfig::new("ws://localhost:8000/ws"),
            Arc::new(ChattyTransport),
            shutdown_tx.subscribe(),
        );
        (client, shutdown_tx)
    }

    #[tokio::test]
    async fn test_render_before_connect() {
        let (client, _shutdown_tx) = spawn_client();
        let metrics = MetricsRegistry::new(client.view()).unwrap();

        let text = metrics.render().unwrap();
        assert!(text.contains("racefeed_connected 0"));
        assert!(text.contains("racefeed_handles_opened 0"));
        assert!(text.contains("racefeed_snapshot_age_seconds -1"));
    }

    #[tokio::test]
    async fn test_render_tracks_feed_activity() {
        let (client, _shutdown_tx) = spawn_client();
        let view = client.view();
        let mut connected = view.subscribe_connection();
        let mut snapshots = view.subscribe_snapshots();
        let metrics = MetricsRegistry::new(view.clone()).unwrap();

        client.connect();
        connected.wait_for(|c| *c).await.unwrap();
        snapshots.wait_for(Option::is_some).await.unwrap();
        // The broken frame is queued right behind the good one.
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }

        let text = metrics.render().unwrap();
        assert!(text.contains("racefeed_connected 1"));
        assert!(text.contains("racefeed_handles_opened 1"));
        assert!(text.contains("racefeed_messages_received 2"));
        assert!(text.contains("racefeed_snapshots_published 1"));
        assert!(text.contains("racefeed_decode_failures 1"));
        assert!(text.contains("racefeed_retries_scheduled 0"));
    }
}
