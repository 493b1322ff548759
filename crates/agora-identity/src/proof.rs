use agora_types::{AgentKey, AgoraError};

use crate::keypair::{parse_public_key, AgentKeypair};

/// Domain separator prepended to registration challenges before signing,
/// so a registration signature cannot be replayed as any other message.
pub const REGISTRATION_DOMAIN: &str = "agora-register:";

/// Bytes an agent signs to prove ownership of its key during registration.
pub fn registration_message(challenge: &str) -> Vec<u8> {
    format!("{REGISTRATION_DOMAIN}{challenge}").into_bytes()
}

/// Legacy ownership proof: the submitted PKCS8 private key must derive
/// exactly the claimed public key.
pub fn proves_ownership(key: &AgentKey, private_key_hex: &str) -> Result<(), AgoraError> {
    let claimed = parse_public_key(key)?;
    let keypair = AgentKeypair::from_pkcs8_hex(private_key_hex)?;
    if keypair.verifying_key() != claimed {
        return Err(AgoraError::InvalidSignature);
    }
    Ok(())
}
