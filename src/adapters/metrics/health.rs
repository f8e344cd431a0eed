//! Health Check Server - Liveness, Readiness and Snapshot Endpoints
//!
//! Exposes /live, /ready and /snapshot via axum 0.7. Readiness follows
//! the feed's connected flag; /snapshot serves the latest published
//! snapshot as JSON for any HTTP-side observer.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::usecases::live_feed::FeedView;

/// Axum-based health and snapshot HTTP server.
pub struct HealthServer {
    /// Read-only feed projection.
    view: FeedView,
    /// Bind address (default 0.0.0.0:8080 from config).
    bind_address: String,
}

impl HealthServer {
    /// Create a new health server.
    pub const fn new(view: FeedView, bind_address: String) -> Self {
        Self { view, bind_address }
    }

    /// Build the router; exposed separately so tests can drive it in-process.
    pub fn router(view: FeedView) -> Router {
        Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/snapshot", get(Self::snapshot))
            .with_state(view)
    }

    /// Serve until the shutdown signal fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Self::router(self.view);
        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 only while the feed is connected.
    async fn readiness(State(view): State<FeedView>) -> impl IntoResponse {
        if view.is_connected() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    /// Latest snapshot, or 204 before the first one arrives.
    async fn snapshot(State(view): State<FeedView>) -> Response {
        match view.snapshot() {
            Some(snapshot) => Json(snapshot.as_ref().clone()).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    }
}
