//! Configuration Module - TOML-based Client Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides for the feed endpoint.
//! The endpoint address is externalized here - nothing is
//! hardcoded in the client.

pub mod loader;

use serde::Deserialize;

/// Top-level configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the client starts.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Process identity and logging.
  #[serde(default)]
  pub app: AppSection,
  /// Live feed endpoint and reconnect policy.
  pub feed: FeedConfig,
  /// Health and snapshot HTTP server.
  #[serde(default)]
  pub health: HealthConfig,
  /// Prometheus metrics export.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Process identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable instance name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Live feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Streaming endpoint (ws:// or wss://).
  pub endpoint: String,
  /// Delay between a disconnect and the next attempt (milliseconds).
  #[serde(default = "default_reconnect_delay")]
  pub reconnect_delay_ms: u64,
}

/// Health server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
  /// Serve /live, /ready and /snapshot.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Health server bind address.
  #[serde(default = "default_health_addr")]
  pub bind_address: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for AppSection {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
    }
  }
}

impl Default for HealthConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_health_addr(),
    }
  }
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
    }
  }
}

impl FeedConfig {
  /// Feed config for `endpoint` with the default reconnect delay.
  pub fn new(endpoint: impl Into<String>) -> Self {
    Self {
      endpoint: endpoint.into(),
      reconnect_delay_ms: default_reconnect_delay(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "racefeed".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_reconnect_delay() -> u64 {
  3_000
}

fn default_health_addr() -> String {
  "0.0.0.0:8080".to_string()
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
