//! Configuration Loader - File Loading, Overrides and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages
//! for misconfiguration.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Environment variable holding the config file path.
pub const CONFIG_PATH_ENV: &str = "RACEFEED_CONFIG";
/// Overrides `feed.endpoint`.
pub const ENDPOINT_ENV: &str = "RACEFEED_ENDPOINT";
/// Overrides `feed.reconnect_delay_ms`.
pub const RECONNECT_DELAY_ENV: &str = "RACEFEED_RECONNECT_DELAY_MS";

/// Load, override and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - An override is malformed
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = load_config_str(&content, |key| std::env::var(key).ok())?;

  info!(
    endpoint = %config.feed.endpoint,
    reconnect_delay_ms = config.feed.reconnect_delay_ms,
    health = config.health.enabled,
    metrics = config.metrics.enabled,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse TOML, apply overrides from `lookup`, and validate.
///
/// # Errors
/// See [`load_config`].
pub fn load_config_str<F>(content: &str, lookup: F) -> Result<AppConfig>
where
  F: Fn(&str) -> Option<String>,
{
  let mut config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;

  apply_overrides(&mut config, lookup)?;
  validate_config(&config)?;

  Ok(config)
}

/// Apply environment overrides.
fn apply_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(endpoint) = lookup(ENDPOINT_ENV) {
    config.feed.endpoint = endpoint;
  }

  if let Some(delay) = lookup(RECONNECT_DELAY_ENV) {
    config.feed.reconnect_delay_ms = delay
      .trim()
      .parse()
      .with_context(|| format!("{RECONNECT_DELAY_ENV} must be an integer, got '{delay}'"))?;
  }

  Ok(())
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - A ws:// or wss:// endpoint
/// - Non-zero reconnect delay
/// - Parseable bind addresses for enabled servers
fn validate_config(config: &AppConfig) -> Result<()> {
  let endpoint = config.feed.endpoint.trim();
  anyhow::ensure!(!endpoint.is_empty(), "Feed endpoint must not be empty");
  anyhow::ensure!(
    endpoint.starts_with("ws://") || endpoint.starts_with("wss://"),
    "Feed endpoint must use ws:// or wss://, got {endpoint}"
  );

  anyhow::ensure!(
    config.feed.reconnect_delay_ms > 0,
    "reconnect_delay_ms must be positive"
  );

  if config.health.enabled {
    config
      .health
      .bind_address
      .parse::<SocketAddr>()
      .with_context(|| format!("Invalid health bind_address: {}", config.health.bind_address))?;
  }

  if config.metrics.enabled {
    config
      .metrics
      .bind_address
      .parse::<SocketAddr>()
      .with_context(|| format!("Invalid metrics bind_address: {}", config.metrics.bind_address))?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio_test::{assert_err, assert_ok};

  const MINIMAL: &str = r#"
[feed]
endpoint = "ws://localhost:8000/ws"
"#;

  fn no_env(_: &str) -> Option<String> {
    None
  }

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = assert_ok!(load_config_str(MINIMAL, no_env));
    assert_eq!(config.feed.reconnect_delay_ms, 3_000);
    assert_eq!(config.app.log_level, "info");
    assert!(config.health.enabled);
    assert_eq!(config.metrics.bind_address, "0.0.0.0:9090");
  }

  #[test]
  fn test_endpoint_override() {
    let config = assert_ok!(load_config_str(MINIMAL, |key| {
      (key == ENDPOINT_ENV).then(|| "wss://feed.example.com/ws".to_string())
    }));
    assert_eq!(config.feed.endpoint, "wss://feed.example.com/ws");
  }

  #[test]
  fn test_delay_override_must_be_numeric() {
    assert_err!(load_config_str(MINIMAL, |key| {
      (key == RECONNECT_DELAY_ENV).then(|| "soon".to_string())
    }));
    let config = assert_ok!(load_config_str(MINIMAL, |key| {
      (key == RECONNECT_DELAY_ENV).then(|| "250".to_string())
    }));
    assert_eq!(config.feed.reconnect_delay_ms, 250);
  }

  #[test]
  fn test_rejects_http_endpoint() {
    let toml = "[feed]\nendpoint = \"http://localhost:8000/ws\"\n";
    assert_err!(load_config_str(toml, no_env));
  }

  #[test]
  fn test_rejects_zero_delay() {
    let toml = "[feed]\nendpoint = \"ws://localhost:8000/ws\"\nreconnect_delay_ms = 0\n";
    assert_err!(load_config_str(toml, no_env));
  }

  #[test]
  fn test_rejects_bad_bind_address_only_when_enabled() {
    let enabled = format!("{MINIMAL}\n[health]\nbind_address = \"nowhere\"\n");
    assert_err!(load_config_str(&enabled, no_env));

    let disabled = format!("{MINIMAL}\n[health]\nenabled = false\nbind_address = \"nowhere\"\n");
    assert_ok!(load_config_str(&disabled, no_env));
  }

  #[test]
  fn test_missing_feed_section_rejected() {
    assert_err!(load_config_str("[app]\nname = \"x\"\n", no_env));
  }
}
