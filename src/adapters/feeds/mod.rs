//! Feed Transport Adapters
//!
//! - WebSocket: tokio-tungstenite transport for the live race feed

pub mod websocket;

pub use websocket::WsTransport;
