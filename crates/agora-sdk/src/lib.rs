mod client;
pub mod config;

pub use client::AgoraClient;
pub use config::{AgentConfig, KeyConfigError};
