use agora_relay::config::{QueueOverflow, RelayConfig};
use agora_relay::server;
use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Agora relay: agent registration, presence, and message queues over HTTP.
#[derive(Debug, Parser)]
#[command(name = "agora-relay", version, about)]
struct Cli {
    /// TOML config file; flags below override its values.
    #[arg(long, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "AGORA_BIND")]
    bind: Option<SocketAddr>,

    /// Session token lifetime in seconds.
    #[arg(long, env = "AGORA_TOKEN_TTL_SECS")]
    token_ttl_secs: Option<i64>,

    /// Registration challenge lifetime in seconds.
    #[arg(long)]
    challenge_ttl_secs: Option<i64>,

    /// Accept raw private keys as registration proof (legacy clients).
    #[arg(long, env = "AGORA_ALLOW_PRIVATE_KEY_PROOF")]
    allow_private_key_proof: bool,

    /// Leave the caller out of its own peer listing.
    #[arg(long)]
    exclude_self: bool,

    /// Maximum undelivered messages per recipient.
    #[arg(long)]
    max_queue_len: Option<usize>,

    /// Policy when a recipient's queue is full.
    #[arg(long, value_enum)]
    queue_overflow: Option<QueueOverflow>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RelayConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(ttl) = self.token_ttl_secs {
            config.token_ttl_secs = ttl;
        }
        if let Some(ttl) = self.challenge_ttl_secs {
            config.challenge_ttl_secs = ttl;
        }
        if self.allow_private_key_proof {
            config.allow_private_key_proof = true;
        }
        if self.exclude_self {
            config.exclude_self_from_peers = true;
        }
        if let Some(max) = self.max_queue_len {
            config.max_queue_len = max;
        }
        if let Some(policy) = self.queue_overflow {
            config.queue_overflow = policy;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("agora_relay=info,tower_http=info")),
        )
        .init();

    let config = Cli::parse().into_config()?;
    if config.allow_private_key_proof {
        tracing::warn!("private key registration proof is enabled; clients transmit secret keys");
    }
    server::run(config).await
}
