//! JSON bodies of the `/v1` REST surface, shared by relay and client.
//!
//! Field names are camelCase on the wire; optional fields are omitted when
//! absent rather than sent as `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AgentKey, Message, MessageId, Timestamp};

/// Free-form agent metadata, e.g. `{"capabilities": ["summarization"]}`.
pub type Metadata = Map<String, Value>;

/// `GET /v1/challenge` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge: String,
    pub expires_at: Timestamp,
}

/// `POST /v1/register` body.
///
/// Ownership is proven either by `challenge` + `signature`, or (when the
/// relay allows it) by the raw `privateKey`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

// Hand-written so a private key never ends up in a log line.
impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("challenge", &self.challenge)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// `POST /v1/register` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub token: String,
    pub expires_at: Timestamp,
    pub public_key: AgentKey,
}

/// One online agent as listed by `GET /v1/peers`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub public_key: AgentKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub registered_at: Timestamp,
    pub expires_at: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerInfo>,
}

/// `POST /v1/send` body. `payload` defaults to `null` when omitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub message_id: MessageId,
    pub enqueued_at: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

/// Error body returned with every non-2xx relay response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_request_matches_reference_client_body() {
        let body = json!({
            "publicKey": "302a",
            "privateKey": "302e",
            "name": "alice",
            "metadata": {"capabilities": ["summarization"]},
        });
        let req: RegisterRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.public_key, "302a");
        assert_eq!(req.private_key.as_deref(), Some("302e"));
        assert_eq!(req.name.as_deref(), Some("alice"));
        assert!(req.challenge.is_none());
        assert_eq!(
            req.metadata.unwrap()["capabilities"],
            json!(["summarization"])
        );
    }

    #[test]
    fn register_request_debug_redacts_private_key() {
        let req = RegisterRequest {
            public_key: "302a".into(),
            private_key: Some("super-secret".into()),
            ..Default::default()
        };
        let printed = format!("{req:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn send_request_payload_defaults_to_null() {
        let req: SendRequest =
            serde_json::from_value(json!({"to": "302a", "type": "ping"})).unwrap();
        assert_eq!(req.kind, "ping");
        assert!(req.payload.is_null());
        assert!(req.in_reply_to.is_none());
    }

    #[test]
    fn send_request_requires_type() {
        let res: Result<SendRequest, _> =
            serde_json::from_value(json!({"to": "302a", "payload": {}}));
        assert!(res.is_err());
    }

    #[test]
    fn send_request_serializes_in_reply_to_camel_case() {
        let req = SendRequest {
            to: "302a".into(),
            kind: "reply".into(),
            payload: json!(1),
            in_reply_to: Some("m-1".into()),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["inReplyTo"], "m-1");
        assert_eq!(value["type"], "reply");
    }
}
