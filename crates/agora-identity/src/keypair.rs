use agora_types::{AgentKey, AgoraError};
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// DER header of an Ed25519 SubjectPublicKeyInfo (RFC 8410), followed by
/// the 32 raw key bytes.
const SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// An agent's Ed25519 identity keypair.
#[derive(Clone)]
pub struct AgentKeypair {
    signing_key: SigningKey,
}

impl AgentKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        let signing_key = SigningKey::generate(&mut csprng);
        Self { signing_key }
    }

    /// Restore from raw secret key bytes.
    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        Self { signing_key }
    }

    /// Restore from hex-encoded PKCS8 DER, the private key wire format.
    pub fn from_pkcs8_hex(private_hex: &str) -> Result<Self, AgoraError> {
        let der = hex::decode(private_hex)
            .map_err(|e| AgoraError::Validation(format!("private key: {e}")))?;
        let signing_key = SigningKey::from_pkcs8_der(&der)
            .map_err(|e| AgoraError::Validation(format!("private key: {e}")))?;
        Ok(Self { signing_key })
    }

    /// The Ed25519 verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// SPKI DER of the public key.
    pub fn public_key_der(&self) -> Vec<u8> {
        let mut der = SPKI_PREFIX.to_vec();
        der.extend_from_slice(self.verifying_key().as_bytes());
        der
    }

    /// Hex SPKI DER of the public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_der())
    }

    /// Hex PKCS8 DER of the private key.
    pub fn private_key_hex(&self) -> Result<String, AgoraError> {
        let doc = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| AgoraError::Internal(format!("pkcs8 encoding: {e}")))?;
        Ok(hex::encode(doc.as_bytes()))
    }

    /// This agent's relay identifier.
    pub fn agent_key(&self) -> AgentKey {
        AgentKey::from_der(&self.public_key_der())
    }

    /// Sign arbitrary bytes.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Sign and hex-encode, as carried in request bodies.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message).to_bytes())
    }
}

/// Decode an agent key's SPKI DER into an Ed25519 verifying key.
pub fn parse_public_key(key: &AgentKey) -> Result<VerifyingKey, AgoraError> {
    VerifyingKey::from_public_key_der(&key.to_bytes())
        .map_err(|e| AgoraError::Validation(format!("public key: {e}")))
}

/// Verify a hex-encoded signature over `message` against an agent key.
pub fn verify_signature(
    key: &AgentKey,
    message: &[u8],
    signature_hex: &str,
) -> Result<(), AgoraError> {
    let verifying_key = parse_public_key(key)?;
    let sig_bytes = hex::decode(signature_hex).map_err(|_| AgoraError::InvalidSignature)?;
    let signature =
        Signature::from_slice(&sig_bytes).map_err(|_| AgoraError::InvalidSignature)?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| AgoraError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::pkcs8::EncodePublicKey;

    #[test]
    fn public_key_hex_matches_spki_encoder() {
        let kp = AgentKeypair::generate();
        let der = kp.verifying_key().to_public_key_der().unwrap();
        assert_eq!(kp.public_key_hex(), hex::encode(der.as_bytes()));
        assert_eq!(kp.public_key_hex().len(), 88);
    }

    #[test]
    fn pkcs8_roundtrip_preserves_identity() {
        let kp = AgentKeypair::generate();
        let private_hex = kp.private_key_hex().unwrap();
        let kp2 = AgentKeypair::from_pkcs8_hex(&private_hex).unwrap();
        assert_eq!(kp.agent_key(), kp2.agent_key());
    }

    #[test]
    fn parse_public_key_roundtrip() {
        let kp = AgentKeypair::generate();
        let parsed = parse_public_key(&kp.agent_key()).unwrap();
        assert_eq!(parsed, kp.verifying_key());
    }

    #[test]
    fn parse_public_key_rejects_garbage_der() {
        let key = AgentKey::from_hex("deadbeef").unwrap();
        assert!(matches!(
            parse_public_key(&key),
            Err(AgoraError::Validation(_))
        ));
    }

    #[test]
    fn rfc8032_vector_parses() {
        let kp = AgentKeypair::from_bytes(
            &hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
                .unwrap()
                .try_into()
                .unwrap(),
        );
        assert_eq!(
            kp.public_key_hex(),
            "302a300506032b6570032100d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn sign_and_verify() {
        let kp = AgentKeypair::generate();
        let sig = kp.sign_hex(b"hello agora");
        assert!(verify_signature(&kp.agent_key(), b"hello agora", &sig).is_ok());
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let kp = AgentKeypair::generate();
        let sig = kp.sign_hex(b"correct");
        assert!(matches!(
            verify_signature(&kp.agent_key(), b"wrong", &sig),
            Err(AgoraError::InvalidSignature)
        ));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp1 = AgentKeypair::generate();
        let kp2 = AgentKeypair::generate();
        let sig = kp1.sign_hex(b"message");
        assert!(verify_signature(&kp2.agent_key(), b"message", &sig).is_err());
    }

    #[test]
    fn verify_rejects_malformed_signature() {
        let kp = AgentKeypair::generate();
        assert!(verify_signature(&kp.agent_key(), b"m", "zz").is_err());
        assert!(verify_signature(&kp.agent_key(), b"m", "abcd").is_err());
    }
}
