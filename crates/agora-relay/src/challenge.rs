use agora_types::{AgoraError, Timestamp};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

use crate::now_millis;

/// A registration challenge issued by the relay.
#[derive(Clone, Debug)]
pub struct RegistrationChallenge {
    pub nonce: String,
    pub expires_at: Timestamp,
}

impl RegistrationChallenge {
    /// Generate a new challenge with random nonce.
    pub fn new(ttl_seconds: i64) -> Self {
        let mut rng = rand::thread_rng();
        let nonce_bytes: [u8; 16] = rng.gen();
        Self {
            nonce: hex::encode(nonce_bytes),
            expires_at: now_millis().saturating_add(ttl_seconds.saturating_mul(1000)),
        }
    }

    pub fn is_expired(&self) -> bool {
        now_millis() >= self.expires_at
    }
}

/// In-memory store for issued challenges (one-use, TTL-evicted, capped).
#[derive(Clone)]
pub struct ChallengeStore {
    challenges: Arc<RwLock<HashMap<String, RegistrationChallenge>>>,
    max_pending: usize,
}

impl ChallengeStore {
    pub fn new(max_pending: usize) -> Self {
        Self {
            challenges: Arc::new(RwLock::new(HashMap::new())),
            max_pending,
        }
    }

    /// Issue a new challenge and store it. When the store is full, expired
    /// entries are dropped first; if it is still full the request is refused.
    pub fn issue(&self, ttl_seconds: i64) -> Result<RegistrationChallenge, AgoraError> {
        let mut challenges = self.challenges.write().unwrap();
        if challenges.len() >= self.max_pending {
            let now = now_millis();
            challenges.retain(|_, c| c.expires_at > now);
            if challenges.len() >= self.max_pending {
                warn!(pending = challenges.len(), "challenge store full");
                return Err(AgoraError::RateLimited);
            }
        }
        let challenge = RegistrationChallenge::new(ttl_seconds);
        challenges.insert(challenge.nonce.clone(), challenge.clone());
        Ok(challenge)
    }

    /// Consume a challenge (one-use). Returns the challenge if still live.
    pub fn consume(&self, nonce: &str) -> Result<RegistrationChallenge, AgoraError> {
        let challenge = self
            .challenges
            .write()
            .unwrap()
            .remove(nonce)
            .ok_or_else(|| AgoraError::Unauthorized("unknown challenge".into()))?;
        if challenge.is_expired() {
            return Err(AgoraError::Unauthorized("challenge expired".into()));
        }
        Ok(challenge)
    }

    /// Evict expired challenges.
    pub fn evict_expired(&self) -> usize {
        let now = now_millis();
        let mut challenges = self.challenges.write().unwrap();
        let before = challenges.len();
        challenges.retain(|_, c| c.expires_at > now);
        before - challenges.len()
    }

    pub fn len(&self) -> usize {
        self.challenges.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
