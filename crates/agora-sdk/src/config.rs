use agora_identity::AgentKeypair;
use agora_types::AgoraError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An agent's key file, `~/.config/agora/config.json` by default.
///
/// Both keys are hex-encoded DER: SPKI for the public key, PKCS8 for the
/// private key. Unknown fields are ignored.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyConfigError {
    #[error("reading key config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing key config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid key config: {0}")]
    Key(#[from] AgoraError),
    #[error("no home directory to look for the key config in")]
    NoHome,
}

impl AgentConfig {
    /// `~/.config/agora/config.json`.
    pub fn default_path() -> Result<PathBuf, KeyConfigError> {
        let home = dirs::home_dir().ok_or(KeyConfigError::NoHome)?;
        Ok(home.join(".config").join("agora").join("config.json"))
    }

    pub fn from_json_str(contents: &str) -> Result<Self, KeyConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, KeyConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Decode the private key and check it matches the stored public key.
    pub fn keypair(&self) -> Result<AgentKeypair, KeyConfigError> {
        let keypair = AgentKeypair::from_pkcs8_hex(&self.private_key)?;
        if !keypair.public_key_hex().eq_ignore_ascii_case(&self.public_key) {
            return Err(AgoraError::Validation(
                "publicKey does not match privateKey".into(),
            )
            .into());
        }
        Ok(keypair)
    }

    pub fn from_keypair(keypair: &AgentKeypair) -> Result<Self, KeyConfigError> {
        Ok(Self {
            public_key: keypair.public_key_hex(),
            private_key: keypair.private_key_hex()?,
        })
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
