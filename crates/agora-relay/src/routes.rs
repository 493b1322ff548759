use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use agora_types::wire::{
    ChallengeResponse, MessagesResponse, PeersResponse, RegisterRequest, RegisterResponse,
    SendRequest, SendResponse,
};
use agora_types::{AgentKey, AgoraError};

use crate::abuse::RateLimiter;
use crate::challenge::ChallengeStore;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::presence::PresenceDirectory;
use crate::queue::InboundQueueStore;
use crate::registry::IdentityRegistry;
use crate::router::MessageRouter;
use crate::session::{OwnershipProof, SessionManager};

/// Shared relay state passed to all handlers.
#[derive(Clone)]
pub struct RelayState {
    pub config: RelayConfig,
    pub registry: IdentityRegistry,
    pub challenges: ChallengeStore,
    pub sessions: SessionManager,
    pub presence: PresenceDirectory,
    pub router: MessageRouter,
    /// Per-agent buckets.
    pub rate_limiter: RateLimiter,
    /// Per-client-address buckets for the unauthenticated routes.
    pub client_limiter: RateLimiter,
}

impl RelayState {
    /// Wire up empty in-memory tables for `config`.
    pub fn new(config: RelayConfig) -> Self {
        let registry = IdentityRegistry::new();
        let challenges = ChallengeStore::new(config.max_pending_challenges);
        let sessions = SessionManager::new(registry.clone(), challenges.clone(), &config);
        let presence = PresenceDirectory::new(
            sessions.clone(),
            registry.clone(),
            config.exclude_self_from_peers,
        );
        let queues = InboundQueueStore::new(config.max_queue_len, config.queue_overflow);
        let router = MessageRouter::new(registry.clone(), queues, config.max_payload_bytes);
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());
        let client_limiter = RateLimiter::new(config.client_rate_limit.clone());

        Self {
            config,
            registry,
            challenges,
            sessions,
            presence,
            router,
            rate_limiter,
            client_limiter,
        }
    }

    /// Resolve the `Authorization: Bearer <token>` header to an agent.
    fn authenticate(&self, headers: &HeaderMap) -> Result<AgentKey, RelayError> {
        let token = bearer_token(headers)
            .ok_or_else(|| AgoraError::Unauthorized("missing bearer token".into()))?;
        Ok(self.sessions.authenticate(token)?)
    }

    fn check_client(&self, addr: &SocketAddr) -> Result<(), RelayError> {
        if !self.client_limiter.check_ip(&addr.ip().to_string()) {
            return Err(AgoraError::RateLimited.into());
        }
        Ok(())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// --- GET /v1/challenge ---

pub async fn get_challenge(
    State(state): State<Arc<RelayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<impl IntoResponse, RelayError> {
    state.check_client(&addr)?;
    let challenge = state.challenges.issue(state.config.challenge_ttl_secs)?;
    Ok(Json(ChallengeResponse {
        challenge: challenge.nonce,
        expires_at: challenge.expires_at,
    }))
}

// --- POST /v1/register ---

pub async fn register(
    State(state): State<Arc<RelayState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RelayError> {
    state.check_client(&addr)?;
    let Json(req) = body?;
    let key = AgentKey::from_hex(&req.public_key)?;
    let proof = OwnershipProof::from_request(&req)?;
    state.sessions.verify_ownership(&key, proof)?;

    // Charged only once the proof holds.
    if !state.rate_limiter.check_register(&key) {
        return Err(AgoraError::RateLimited.into());
    }

    let issued = state.sessions.admit(&key, req.name, req.metadata);
    Ok(Json(RegisterResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        public_key: issued.public_key,
    }))
}

// --- GET /v1/peers ---

pub async fn get_peers(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, RelayError> {
    let caller = state.authenticate(&headers)?;
    Ok(Json(PeersResponse {
        peers: state.presence.list_peers(&caller),
    }))
}

// --- POST /v1/send ---

pub async fn send(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<impl IntoResponse, RelayError> {
    let sender = state.authenticate(&headers)?;
    let Json(req) = body?;
    if !state.rate_limiter.check_send(&sender) {
        return Err(AgoraError::RateLimited.into());
    }

    let message = state.router.send(&sender, req)?;
    Ok(Json(SendResponse {
        message_id: message.id,
        enqueued_at: message.enqueued_at,
    }))
}

// --- GET /v1/messages ---

pub async fn get_messages(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, RelayError> {
    let caller = state.authenticate(&headers)?;
    Ok(Json(MessagesResponse {
        messages: state.router.poll(&caller),
    }))
}

// --- DELETE /v1/disconnect ---

pub async fn disconnect(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, RelayError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AgoraError::Unauthorized("missing bearer token".into()))?;
    state.sessions.disconnect(token)?;
    Ok(Json(json!({ "ok": true })))
}

// --- Health check ---

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "agora-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
