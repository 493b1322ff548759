use agora_types::wire::PeerInfo;
use agora_types::AgentKey;

use crate::registry::IdentityRegistry;
use crate::session::SessionManager;

/// Online-agent view derived from live sessions. Holds no state of its own.
#[derive(Clone)]
pub struct PresenceDirectory {
    sessions: SessionManager,
    registry: IdentityRegistry,
    exclude_self: bool,
}

impl PresenceDirectory {
    pub fn new(sessions: SessionManager, registry: IdentityRegistry, exclude_self: bool) -> Self {
        Self {
            sessions,
            registry,
            exclude_self,
        }
    }

    /// Every agent holding a non-expired token, sorted by public key.
    pub fn list_peers(&self, caller: &AgentKey) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self
            .sessions
            .live_sessions()
            .into_iter()
            .filter(|s| !(self.exclude_self && &s.public_key == caller))
            .filter_map(|s| {
                let identity = self.registry.get(&s.public_key)?;
                Some(PeerInfo {
                    public_key: identity.public_key,
                    name: identity.name,
                    metadata: identity.metadata,
                    registered_at: identity.registered_at,
                    expires_at: s.expires_at,
                })
            })
            .collect();
        peers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        peers
    }
}
