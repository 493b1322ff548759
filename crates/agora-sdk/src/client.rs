use agora_identity::{registration_message, AgentKeypair};
use agora_types::wire::{
    ChallengeResponse, ErrorBody, MessagesResponse, Metadata, PeerInfo, PeersResponse,
    RegisterRequest, RegisterResponse, SendRequest, SendResponse,
};
use agora_types::{AgentKey, AgoraError, Message, Timestamp};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::config::{AgentConfig, KeyConfigError};

/// Token held between `register` and `disconnect`.
#[derive(Clone, Debug)]
struct ActiveSession {
    token: String,
    expires_at: Timestamp,
}

/// REST client for one agent talking to an Agora relay.
///
/// Any non-2xx response becomes an `AgoraError`; nothing is retried.
pub struct AgoraClient {
    keypair: AgentKeypair,
    relay_url: String,
    name: Option<String>,
    http: reqwest::Client,
    session: Option<ActiveSession>,
}

impl AgoraClient {
    /// Create a client for `keypair` against `relay_url` (e.g. `http://localhost:8080`).
    pub fn new(keypair: AgentKeypair, relay_url: impl Into<String>) -> Self {
        let relay_url: String = relay_url.into();
        Self {
            keypair,
            relay_url: relay_url.trim_end_matches('/').to_string(),
            name: None,
            http: reqwest::Client::new(),
            session: None,
        }
    }

    /// Create a client from the key pair stored in an agent key file; `None`
    /// reads `~/.config/agora/config.json`.
    pub fn from_config(
        path: Option<&Path>,
        relay_url: impl Into<String>,
    ) -> Result<Self, KeyConfigError> {
        let config = match path {
            Some(path) => AgentConfig::load(path)?,
            None => AgentConfig::load(&AgentConfig::default_path()?)?,
        };
        Ok(Self::new(config.keypair()?, relay_url))
    }

    /// Human-readable name sent on registration.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// This agent's relay identifier.
    pub fn agent_key(&self) -> AgentKey {
        self.keypair.agent_key()
    }

    pub fn keypair(&self) -> &AgentKeypair {
        &self.keypair
    }

    /// Current session token, if registered.
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.session.as_ref().map(|s| s.expires_at)
    }

    /// Register by signing a relay-issued challenge.
    pub async fn register(
        &mut self,
        metadata: Option<Metadata>,
    ) -> Result<RegisterResponse, AgoraError> {
        let challenge = self.challenge().await?;
        let signature = self
            .keypair
            .sign_hex(&registration_message(&challenge.challenge));
        let req = RegisterRequest {
            public_key: self.keypair.public_key_hex(),
            challenge: Some(challenge.challenge),
            signature: Some(signature),
            name: self.name.clone(),
            metadata,
            ..Default::default()
        };
        self.submit_registration(&req).await
    }

    /// Register the legacy way, by transmitting the PKCS8 private key. Only
    /// relays started with private-key proofs enabled accept this.
    pub async fn register_with_private_key(
        &mut self,
        metadata: Option<Metadata>,
    ) -> Result<RegisterResponse, AgoraError> {
        let req = RegisterRequest {
            public_key: self.keypair.public_key_hex(),
            private_key: Some(self.keypair.private_key_hex()?),
            name: self.name.clone(),
            metadata,
            ..Default::default()
        };
        self.submit_registration(&req).await
    }

    async fn challenge(&self) -> Result<ChallengeResponse, AgoraError> {
        let resp = self
            .http
            .get(self.url("/v1/challenge"))
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }

    async fn submit_registration(
        &mut self,
        req: &RegisterRequest,
    ) -> Result<RegisterResponse, AgoraError> {
        let resp = self
            .http
            .post(self.url("/v1/register"))
            .json(req)
            .send()
            .await
            .map_err(transport)?;
        let registered: RegisterResponse = decode(resp).await?;
        debug!(agent = %registered.public_key.short(), "registered with relay");
        self.session = Some(ActiveSession {
            token: registered.token.clone(),
            expires_at: registered.expires_at,
        });
        Ok(registered)
    }

    /// Currently online agents.
    pub async fn peers(&self) -> Result<Vec<PeerInfo>, AgoraError> {
        let resp = self
            .http
            .get(self.url("/v1/peers"))
            .bearer_auth(self.require_token()?)
            .send()
            .await
            .map_err(transport)?;
        let body: PeersResponse = decode(resp).await?;
        Ok(body.peers)
    }

    /// Send a typed message to `to`.
    pub async fn send(
        &self,
        to: &AgentKey,
        kind: &str,
        payload: Value,
        in_reply_to: Option<&str>,
    ) -> Result<SendResponse, AgoraError> {
        let req = SendRequest {
            to: to.to_string(),
            kind: kind.to_string(),
            payload,
            in_reply_to: in_reply_to.map(str::to_string),
        };
        let resp = self
            .http
            .post(self.url("/v1/send"))
            .bearer_auth(self.require_token()?)
            .json(&req)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }

    /// Retrieve queued inbound messages. Clears the relay-side queue.
    pub async fn poll_messages(&self) -> Result<Vec<Message>, AgoraError> {
        let resp = self
            .http
            .get(self.url("/v1/messages"))
            .bearer_auth(self.require_token()?)
            .send()
            .await
            .map_err(transport)?;
        let body: MessagesResponse = decode(resp).await?;
        Ok(body.messages)
    }

    /// End the session and invalidate the token.
    pub async fn disconnect(&mut self) -> Result<(), AgoraError> {
        let resp = self
            .http
            .delete(self.url("/v1/disconnect"))
            .bearer_auth(self.require_token()?)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        self.session = None;
        Ok(())
    }

    fn require_token(&self) -> Result<&str, AgoraError> {
        self.token()
            .ok_or_else(|| AgoraError::Unauthorized("not registered; call register() first".into()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.relay_url, path)
    }
}

fn transport(e: reqwest::Error) -> AgoraError {
    AgoraError::Transport(e.to_string())
}

/// Turn a non-2xx response into the matching error kind.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AgoraError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.json::<ErrorBody>().await.ok();
    Err(error_for_status(status.as_u16(), body))
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, AgoraError> {
    check(resp)
        .await?
        .json::<T>()
        .await
        .map_err(|e| AgoraError::Serialization(e.to_string()))
}

fn error_for_status(status: u16, body: Option<ErrorBody>) -> AgoraError {
    let (kind, detail) = match body {
        Some(body) => (body.error, body.detail),
        None => (String::new(), format!("relay returned HTTP {status}")),
    };
    match status {
        401 => AgoraError::Unauthorized(detail),
        403 => AgoraError::InvalidSignature,
        404 => AgoraError::UnknownRecipient(detail),
        409 => AgoraError::Conflict(detail),
        400 | 422 => AgoraError::Validation(detail),
        429 if kind == "queue full" => AgoraError::QueueFull(detail),
        429 => AgoraError::RateLimited,
        _ => AgoraError::Internal(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(kind: &str, detail: &str) -> Option<ErrorBody> {
        Some(ErrorBody {
            error: kind.into(),
            detail: detail.into(),
        })
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        assert!(matches!(
            error_for_status(401, body("unauthorized", "token expired")),
            AgoraError::Unauthorized(d) if d == "token expired"
        ));
        assert!(matches!(
            error_for_status(404, body("unknown recipient", "x")),
            AgoraError::UnknownRecipient(_)
        ));
        assert!(matches!(error_for_status(403, None), AgoraError::InvalidSignature));
        assert!(matches!(error_for_status(400, None), AgoraError::Validation(_)));
        assert!(matches!(error_for_status(409, None), AgoraError::Conflict(_)));
        assert!(matches!(
            error_for_status(429, body("queue full", "x")),
            AgoraError::QueueFull(_)
        ));
        assert!(matches!(
            error_for_status(429, body("rate limited", "x")),
            AgoraError::RateLimited
        ));
        assert!(matches!(error_for_status(502, None), AgoraError::Internal(_)));
    }

    #[test]
    fn relay_url_trailing_slash_is_trimmed() {
        let client = AgoraClient::new(AgentKeypair::generate(), "http://localhost:8080/");
        assert_eq!(client.url("/v1/peers"), "http://localhost:8080/v1/peers");
    }

    #[test]
    fn client_from_key_file() {
        let kp = AgentKeypair::generate();
        let path = std::env::temp_dir().join(format!("agora-client-{}.json", kp.agent_key().short()));
        let config = AgentConfig::from_keypair(&kp).unwrap();
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let client = AgoraClient::from_config(Some(&path), "http://localhost:8080");
        std::fs::remove_file(&path).unwrap();
        assert_eq!(client.unwrap().agent_key(), kp.agent_key());
    }

    #[tokio::test]
    async fn calls_before_register_fail_without_network() {
        let client = AgoraClient::new(AgentKeypair::generate(), "http://127.0.0.1:9");
        assert!(matches!(client.peers().await, Err(AgoraError::Unauthorized(_))));
        assert!(client.token().is_none());
    }
}
