use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::abuse::RateLimitConfig;

/// What to do when a send would grow a recipient's queue past `max_queue_len`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum QueueOverflow {
    /// Evict the oldest undelivered message to make room.
    #[default]
    DropOldest,
    /// Fail the send with `QueueFull`.
    RejectNew,
}

/// Relay server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to bind the HTTP server to.
    pub bind_addr: SocketAddr,
    /// Session token lifetime in seconds. Zero issues already-expired tokens.
    pub token_ttl_secs: i64,
    /// Registration challenge lifetime in seconds.
    pub challenge_ttl_secs: i64,
    /// Upper bound on issued, unconsumed registration challenges.
    pub max_pending_challenges: usize,
    /// Period of the background expiry sweep.
    pub sweep_interval_secs: u64,
    /// Accept the legacy `privateKey` proof in `/v1/register`.
    pub allow_private_key_proof: bool,
    /// Leave the caller out of its own `/v1/peers` listing.
    pub exclude_self_from_peers: bool,
    /// Maximum undelivered messages per recipient.
    pub max_queue_len: usize,
    pub queue_overflow: QueueOverflow,
    /// Maximum serialized payload size accepted by `/v1/send`.
    pub max_payload_bytes: usize,
    /// Per-agent buckets: verified registrations and sends.
    pub rate_limit: RateLimitConfig,
    /// Per-client-address buckets: challenge and register requests.
    pub client_rate_limit: RateLimitConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 8080).into(),
            token_ttl_secs: 3600,
            challenge_ttl_secs: 300,
            max_pending_challenges: 10_000,
            sweep_interval_secs: 30,
            allow_private_key_proof: false,
            exclude_self_from_peers: false,
            max_queue_len: 10_000,
            queue_overflow: QueueOverflow::DropOldest,
            max_payload_bytes: 256 * 1024,
            rate_limit: RateLimitConfig::default(),
            client_rate_limit: RateLimitConfig {
                max_tokens: 120,
                refill_rate: 2.0,
                cost: 1,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl RelayConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = RelayConfig::from_toml_str("").unwrap();
        assert_eq!(config.token_ttl_secs, 3600);
        assert_eq!(config.queue_overflow, QueueOverflow::DropOldest);
        assert!(!config.allow_private_key_proof);
        assert!(!config.exclude_self_from_peers);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = RelayConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            token_ttl_secs = 60
            queue_overflow = "reject-new"
            exclude_self_from_peers = true

            [rate_limit]
            max_tokens = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.token_ttl_secs, 60);
        assert_eq!(config.queue_overflow, QueueOverflow::RejectNew);
        assert!(config.exclude_self_from_peers);
        assert_eq!(config.rate_limit.max_tokens, 5);
        assert_eq!(config.rate_limit.cost, 1);
        assert_eq!(config.max_queue_len, 10_000);
        assert_eq!(config.client_rate_limit.max_tokens, 120);
        assert_eq!(config.max_pending_challenges, 10_000);
    }

    #[test]
    fn unknown_overflow_policy_is_rejected() {
        assert!(RelayConfig::from_toml_str(r#"queue_overflow = "shrug""#).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RelayConfig::load(Path::new("/nonexistent/agora-relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
