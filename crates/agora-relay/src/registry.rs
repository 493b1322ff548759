use agora_types::wire::Metadata;
use agora_types::{AgentKey, Timestamp};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::now_millis;

/// A registered agent. Identities outlive sessions: the record stays after
/// disconnect so queued messages can still be addressed to it.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentIdentity {
    pub public_key: AgentKey,
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
    /// Time of the most recent registration.
    pub registered_at: Timestamp,
}

/// Public key -> agent record.
#[derive(Clone, Default)]
pub struct IdentityRegistry {
    agents: Arc<RwLock<HashMap<AgentKey, AgentIdentity>>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the record for `key`. Name and metadata are
    /// replaced wholesale, so omitting them on re-registration clears them.
    pub fn upsert(
        &self,
        key: AgentKey,
        name: Option<String>,
        metadata: Option<Metadata>,
    ) -> AgentIdentity {
        let identity = AgentIdentity {
            public_key: key.clone(),
            name,
            metadata,
            registered_at: now_millis(),
        };
        self.agents.write().unwrap().insert(key, identity.clone());
        identity
    }

    pub fn get(&self, key: &AgentKey) -> Option<AgentIdentity> {
        self.agents.read().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &AgentKey) -> bool {
        self.agents.read().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.agents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_identity::AgentKeypair;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn upsert_and_get() {
        let registry = IdentityRegistry::new();
        let key = AgentKeypair::generate().agent_key();
        registry.upsert(
            key.clone(),
            Some("alice".into()),
            Some(metadata(json!({"capabilities": ["summarization"]}))),
        );

        let record = registry.get(&key).unwrap();
        assert_eq!(record.name.as_deref(), Some("alice"));
        assert_eq!(
            record.metadata.unwrap()["capabilities"],
            json!(["summarization"])
        );
        assert!(registry.contains(&key));
    }

    #[test]
    fn reregistration_overwrites_profile() {
        let registry = IdentityRegistry::new();
        let key = AgentKeypair::generate().agent_key();
        registry.upsert(key.clone(), Some("alice".into()), Some(metadata(json!({"v": 1}))));
        registry.upsert(key.clone(), Some("alice-2".into()), None);

        let record = registry.get(&key).unwrap();
        assert_eq!(record.name.as_deref(), Some("alice-2"));
        assert!(record.metadata.is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_key_is_absent() {
        let registry = IdentityRegistry::new();
        let key = AgentKeypair::generate().agent_key();
        assert!(registry.get(&key).is_none());
        assert!(!registry.contains(&key));
        assert!(registry.is_empty());
    }
}
