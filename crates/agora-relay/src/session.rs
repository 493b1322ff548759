use agora_identity::{parse_public_key, proves_ownership, registration_message, verify_signature};
use agora_types::wire::{Metadata, RegisterRequest};
use agora_types::{AgentKey, AgoraError, Timestamp};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::challenge::ChallengeStore;
use crate::config::RelayConfig;
use crate::now_millis;
use crate::registry::IdentityRegistry;

/// A live binding of a bearer token to an agent key.
#[derive(Clone, Debug)]
pub struct Session {
    pub public_key: AgentKey,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// What a successful registration hands back to the agent.
#[derive(Clone, Debug)]
pub struct IssuedSession {
    pub token: String,
    pub public_key: AgentKey,
    pub expires_at: Timestamp,
}

/// How a registering agent proves it controls its key.
#[derive(Clone)]
pub enum OwnershipProof {
    /// Signature over `registration_message(challenge)`.
    SignedChallenge { challenge: String, signature: String },
    /// Legacy: the PKCS8 private key itself.
    PrivateKey(String),
}

impl OwnershipProof {
    /// Pick the proof carried by a register body. A signed challenge wins
    /// when both forms are present.
    pub fn from_request(req: &RegisterRequest) -> Result<Self, AgoraError> {
        match (&req.challenge, &req.signature, &req.private_key) {
            (Some(challenge), Some(signature), _) => Ok(Self::SignedChallenge {
                challenge: challenge.clone(),
                signature: signature.clone(),
            }),
            (None, None, Some(private_key)) => Ok(Self::PrivateKey(private_key.clone())),
            (Some(_), None, _) | (None, Some(_), _) => Err(AgoraError::Validation(
                "challenge and signature must be sent together".into(),
            )),
            (None, None, None) => Err(AgoraError::Validation(
                "missing proof of key ownership".into(),
            )),
        }
    }
}

/// Sessions are indexed by SHA-256 of the token, so raw tokens are never
/// held after issuance.
#[derive(Default)]
struct SessionTable {
    by_digest: HashMap<String, Session>,
    by_key: HashMap<AgentKey, String>,
}

impl SessionTable {
    fn remove(&mut self, digest: &str) -> Option<Session> {
        let session = self.by_digest.remove(digest)?;
        if self.by_key.get(&session.public_key).map(String::as_str) == Some(digest) {
            self.by_key.remove(&session.public_key);
        }
        Some(session)
    }
}

/// Issues, validates, and expires bearer tokens. At most one live session
/// exists per public key; issuing a new one revokes the old token.
#[derive(Clone)]
pub struct SessionManager {
    registry: IdentityRegistry,
    challenges: ChallengeStore,
    table: Arc<RwLock<SessionTable>>,
    token_ttl_secs: i64,
    allow_private_key_proof: bool,
}

impl SessionManager {
    pub fn new(registry: IdentityRegistry, challenges: ChallengeStore, config: &RelayConfig) -> Self {
        Self {
            registry,
            challenges,
            table: Arc::new(RwLock::new(SessionTable::default())),
            token_ttl_secs: config.token_ttl_secs,
            allow_private_key_proof: config.allow_private_key_proof,
        }
    }

    /// Verify ownership of `key`, record the identity, and issue a fresh
    /// token. Nothing is written unless the proof checks out.
    pub fn register(
        &self,
        key: &AgentKey,
        proof: OwnershipProof,
        name: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<IssuedSession, AgoraError> {
        self.verify_ownership(key, proof)?;
        Ok(self.admit(key, name, metadata))
    }

    /// Check that the caller controls `key`. A signed challenge is consumed
    /// whether or not the signature verifies.
    pub fn verify_ownership(&self, key: &AgentKey, proof: OwnershipProof) -> Result<(), AgoraError> {
        parse_public_key(key)?;
        match proof {
            OwnershipProof::SignedChallenge { challenge, signature } => {
                self.challenges.consume(&challenge)?;
                verify_signature(key, &registration_message(&challenge), &signature)
            }
            OwnershipProof::PrivateKey(private_key) => {
                if !self.allow_private_key_proof {
                    return Err(AgoraError::Validation(
                        "private key registration is disabled; sign a challenge from /v1/challenge"
                            .into(),
                    ));
                }
                proves_ownership(key, &private_key)
            }
        }
    }

    /// Record the identity of an agent whose ownership has been verified and
    /// issue its token.
    pub fn admit(
        &self,
        key: &AgentKey,
        name: Option<String>,
        metadata: Option<Metadata>,
    ) -> IssuedSession {
        self.registry.upsert(key.clone(), name, metadata);
        let issued = self.issue(key);
        info!(agent = %key.short(), expires_at = issued.expires_at, "agent registered");
        issued
    }

    /// Issue a token with the configured TTL.
    pub fn issue(&self, key: &AgentKey) -> IssuedSession {
        self.issue_with_ttl(key, self.token_ttl_secs)
    }

    /// Issue a token with a specific TTL, revoking any prior session for `key`.
    pub fn issue_with_ttl(&self, key: &AgentKey, ttl_seconds: i64) -> IssuedSession {
        let token_bytes: [u8; 32] = rand::thread_rng().gen();
        let token = hex::encode(token_bytes);
        let now = now_millis();
        let session = Session {
            public_key: key.clone(),
            issued_at: now,
            expires_at: now.saturating_add(ttl_seconds.saturating_mul(1000)),
        };
        let expires_at = session.expires_at;

        let digest = token_digest(&token);
        let mut table = self.table.write().unwrap();
        if let Some(previous) = table.by_key.insert(key.clone(), digest.clone()) {
            table.by_digest.remove(&previous);
            debug!(agent = %key.short(), "previous session revoked");
        }
        table.by_digest.insert(digest, session);

        IssuedSession {
            token,
            public_key: key.clone(),
            expires_at,
        }
    }

    /// Resolve a bearer token to its agent. Expired sessions are removed on
    /// the spot.
    pub fn authenticate(&self, token: &str) -> Result<AgentKey, AgoraError> {
        let digest = token_digest(token);
        let now = now_millis();
        {
            let table = self.table.read().unwrap();
            match table.by_digest.get(&digest) {
                None => return Err(AgoraError::Unauthorized("unknown token".into())),
                Some(session) if !session.is_expired(now) => {
                    return Ok(session.public_key.clone())
                }
                Some(_) => {}
            }
        }
        let mut table = self.table.write().unwrap();
        let expired = table
            .by_digest
            .get(&digest)
            .is_some_and(|s| s.is_expired(now));
        if expired {
            if let Some(session) = table.remove(&digest) {
                debug!(agent = %session.public_key.short(), "session expired");
            }
        }
        Err(AgoraError::Unauthorized("token expired".into()))
    }

    /// Destroy the session behind `token`. The agent goes offline at once.
    pub fn disconnect(&self, token: &str) -> Result<AgentKey, AgoraError> {
        let digest = token_digest(token);
        let mut table = self.table.write().unwrap();
        let session = table
            .remove(&digest)
            .ok_or_else(|| AgoraError::Unauthorized("unknown token".into()))?;
        if session.is_expired(now_millis()) {
            return Err(AgoraError::Unauthorized("token expired".into()));
        }
        info!(agent = %session.public_key.short(), "agent disconnected");
        Ok(session.public_key)
    }

    /// Whether `key` holds a non-expired token.
    pub fn is_online(&self, key: &AgentKey) -> bool {
        let now = now_millis();
        let table = self.table.read().unwrap();
        table
            .by_key
            .get(key)
            .and_then(|digest| table.by_digest.get(digest))
            .is_some_and(|s| !s.is_expired(now))
    }

    /// All non-expired sessions.
    pub fn live_sessions(&self) -> Vec<Session> {
        let now = now_millis();
        self.table
            .read()
            .unwrap()
            .by_digest
            .values()
            .filter(|s| !s.is_expired(now))
            .cloned()
            .collect()
    }

    /// Remove expired sessions.
    pub fn sweep_expired(&self) -> usize {
        let now = now_millis();
        let mut table = self.table.write().unwrap();
        let before = table.by_digest.len();
        table.by_digest.retain(|_, s| !s.is_expired(now));
        let SessionTable { by_digest, by_key } = &mut *table;
        by_key.retain(|_, digest| by_digest.contains_key(digest));
        before - by_digest.len()
    }

    /// Total number of sessions (including expired, not yet swept).
    #[cfg(test)]
    fn count(&self) -> usize {
        self.table.read().unwrap().by_digest.len()
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
