use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod wire;

/// Agent identity: lowercase hex of the agent's Ed25519 SPKI DER public key.
///
/// The hex string itself is the durable identifier. Input is accepted in any
/// case and normalized, so two spellings of the same key compare equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentKey(String);

impl AgentKey {
    /// Parse and normalize a hex-encoded key. Only the hex syntax is checked
    /// here; DER decoding lives in `agora-identity`.
    pub fn from_hex(s: &str) -> Result<Self, AgoraError> {
        if s.is_empty() {
            return Err(AgoraError::Validation("public key is empty".into()));
        }
        hex::decode(s).map_err(|e| AgoraError::Validation(format!("public key: {e}")))?;
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Encode raw DER bytes as a key.
    pub fn from_der(der: &[u8]) -> Self {
        Self(hex::encode(der))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw DER bytes behind the hex string.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Validated on construction.
        hex::decode(&self.0).unwrap_or_default()
    }

    /// Tail of the key for log lines. SPKI encodings share a fixed prefix,
    /// so the distinguishing bytes are at the end.
    pub fn short(&self) -> &str {
        let start = self.0.len().saturating_sub(16);
        &self.0[start..]
    }
}

impl TryFrom<String> for AgentKey {
    type Error = AgoraError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<AgentKey> for String {
    fn from(key: AgentKey) -> Self {
        key.0
    }
}

impl fmt::Debug for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentKey(..{})", self.short())
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relay-assigned message identifier (UUID v4, hyphenated).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix epoch timestamp in milliseconds.
pub type Timestamp = i64;

/// A message as held in a recipient's inbound queue and returned by poll.
///
/// `type` is an open tag and `payload` is opaque to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub from: AgentKey,
    pub to: AgentKey,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub enqueued_at: Timestamp,
}

/// Common error types.
#[derive(Debug, thiserror::Error)]
pub enum AgoraError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("inbound queue full: {0}")]
    QueueFull(String),
    #[error("rate limited")]
    RateLimited,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEY: &str = "302a300506032b6570032100d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    #[test]
    fn agent_key_normalizes_case() {
        let upper = AgentKey::from_hex(&KEY.to_ascii_uppercase()).unwrap();
        let lower = AgentKey::from_hex(KEY).unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.as_str(), KEY);
    }

    #[test]
    fn agent_key_rejects_bad_hex() {
        assert!(AgentKey::from_hex("").is_err());
        assert!(AgentKey::from_hex("abc").is_err());
        assert!(AgentKey::from_hex("zz").is_err());
    }

    #[test]
    fn agent_key_short_uses_tail() {
        let key = AgentKey::from_hex(KEY).unwrap();
        assert_eq!(key.short(), "af021a68f707511a");
        assert_eq!(format!("{key:?}"), "AgentKey(..af021a68f707511a)");
    }

    #[test]
    fn agent_key_deserialize_validates() {
        let ok: Result<AgentKey, _> = serde_json::from_value(json!(KEY));
        assert!(ok.is_ok());
        let bad: Result<AgentKey, _> = serde_json::from_value(json!("not-hex"));
        assert!(bad.is_err());
    }

    #[test]
    fn message_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }

    #[test]
    fn message_wire_shape() {
        let key = AgentKey::from_hex(KEY).unwrap();
        let msg = Message {
            id: MessageId("m-1".into()),
            from: key.clone(),
            to: key,
            kind: "publish".into(),
            payload: json!({"text": "Hello"}),
            in_reply_to: None,
            enqueued_at: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "publish");
        assert_eq!(value["from"], KEY);
        assert_eq!(value["enqueuedAt"], 1_700_000_000_000i64);
        assert!(value.get("inReplyTo").is_none());

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }
}
