//! WebSocket Feed Transport - tokio-tungstenite Adapter
//!
//! Implements the `FeedTransport` port. Each `open` spawns one task that
//! connects, forwards text frames as `TransportEvent::Message`, and reports
//! exactly one `Closed` when the socket ends for any reason.
//!
//! Features:
//! - Non-blocking open (connection runs in its own tokio task)
//! - Close on request or handle drop (sends a close frame when connected)
//! - Ping/pong handled by tungstenite; binary frames ignored
//! - Event-driven via tokio::select! (NEVER polling)

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

use crate::domain::link::HandleId;
use crate::ports::transport::{
    FeedTransport, SignalSender, TransportEvent, TransportHandle, TransportSignal,
};

/// WebSocket implementation of the feed transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

impl WsTransport {
    pub const fn new() -> Self {
        Self
    }
}

impl FeedTransport for WsTransport {
    fn open(&self, endpoint: &str, id: HandleId, signals: SignalSender) -> Box<dyn TransportHandle> {
        let (close_tx, close_rx) = oneshot::channel();
        tokio::spawn(run_socket(endpoint.to_string(), id, signals, close_rx));
        Box::new(WsHandle {
            close_tx: Some(close_tx),
        })
    }
}

/// Close trigger for one socket task. Dropping it also closes the socket.
#[derive(Debug)]
struct WsHandle {
    close_tx: Option<oneshot::Sender<()>>,
}

impl TransportHandle for WsHandle {
    fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            // The task may already have exited on its own.
            let _ = tx.send(());
        }
    }
}

/// Socket task: drive the connection, then report the single close.
#[instrument(skip(signals, close_rx), fields(handle = %id))]
async fn run_socket(
    endpoint: String,
    id: HandleId,
    signals: SignalSender,
    mut close_rx: oneshot::Receiver<()>,
) {
    if let Err(e) = drive_socket(&endpoint, id, &signals, &mut close_rx).await {
        let _ = signals.send(TransportSignal::new(id, TransportEvent::Failed(format!("{e:#}"))));
    }
    let _ = signals.send(TransportSignal::new(id, TransportEvent::Closed));
    debug!("Socket task finished");
}

/// Connect and stream until close request, remote close, or error.
///
/// `Ok(())` means an orderly close; `Err` is reported as a transport failure.
async fn drive_socket(
    endpoint: &str,
    id: HandleId,
    signals: &SignalSender,
    close_rx: &mut oneshot::Receiver<()>,
) -> Result<()> {
    let ws_stream = tokio::select! {
        biased;
        _ = &mut *close_rx => {
            debug!("Close requested before connection established");
            return Ok(());
        }
        connected = connect_async(endpoint) => {
            let (ws_stream, _) = connected.context("Feed WebSocket connection failed")?;
            ws_stream
        }
    };

    let (mut write, mut read) = ws_stream.split();

    info!(endpoint, "Feed WebSocket open");
    let _ = signals.send(TransportSignal::new(id, TransportEvent::Opened));

    loop {
        tokio::select! {
            biased;
            _ = &mut *close_rx => {
                debug!("Close requested, sending close frame");
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Close frame not delivered");
                }
                return Ok(());
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = signals.send(TransportSignal::new(
                            id,
                            TransportEvent::Message(text.to_string()),
                        ));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        debug!(len = data.len(), "Binary frame ignored");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Feed WebSocket closed by server");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Feed WebSocket read error");
                        return Err(anyhow::anyhow!("Feed WS error: {e}"));
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}
