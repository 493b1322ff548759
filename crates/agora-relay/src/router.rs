use agora_types::wire::SendRequest;
use agora_types::{AgentKey, AgoraError, Message, MessageId};
use tracing::info;

use crate::now_millis;
use crate::queue::InboundQueueStore;
use crate::registry::IdentityRegistry;

/// Validates sends and moves messages into recipients' inbound queues.
///
/// The relay never looks inside `payload`; only its serialized size is
/// checked.
#[derive(Clone)]
pub struct MessageRouter {
    registry: IdentityRegistry,
    queues: InboundQueueStore,
    max_payload_bytes: usize,
}

impl MessageRouter {
    pub fn new(
        registry: IdentityRegistry,
        queues: InboundQueueStore,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            registry,
            queues,
            max_payload_bytes,
        }
    }

    /// Enqueue a message from an authenticated sender. The recipient must
    /// be registered but need not be online.
    pub fn send(&self, sender: &AgentKey, req: SendRequest) -> Result<Message, AgoraError> {
        if req.kind.trim().is_empty() {
            return Err(AgoraError::Validation("message type is empty".into()));
        }
        let to = AgentKey::from_hex(&req.to)?;

        let payload_len = serde_json::to_vec(&req.payload)
            .map_err(|e| AgoraError::Serialization(e.to_string()))?
            .len();
        if payload_len > self.max_payload_bytes {
            return Err(AgoraError::Validation(format!(
                "payload is {payload_len} bytes, limit is {}",
                self.max_payload_bytes
            )));
        }

        if !self.registry.contains(&to) {
            return Err(AgoraError::UnknownRecipient(to.to_string()));
        }

        let message = Message {
            id: MessageId::generate(),
            from: sender.clone(),
            to,
            kind: req.kind,
            payload: req.payload,
            in_reply_to: req.in_reply_to,
            enqueued_at: now_millis(),
        };
        self.queues.push(message.clone())?;

        info!(
            from = %message.from.short(),
            to = %message.to.short(),
            message_id = %message.id,
            kind = %message.kind,
            "message enqueued"
        );
        Ok(message)
    }

    /// Drain the caller's queue. Destructive: returned messages are gone.
    pub fn poll(&self, key: &AgentKey) -> Vec<Message> {
        let messages = self.queues.drain(key);
        if !messages.is_empty() {
            info!(agent = %key.short(), count = messages.len(), "messages delivered");
        }
        messages
    }

    pub fn pending(&self, key: &AgentKey) -> usize {
        self.queues.pending(key)
    }
}
