use agora_types::{AgentKey, AgoraError, Message, MessageId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::config::QueueOverflow;

/// Per-recipient FIFO queues of undelivered messages.
///
/// One mutex guards every queue, so a push and a drain on the same
/// recipient are serialized: a drain returns exactly the messages pushed
/// before it, and no message is handed out twice.
#[derive(Clone)]
pub struct InboundQueueStore {
    queues: Arc<Mutex<HashMap<AgentKey, VecDeque<Message>>>>,
    max_len: usize,
    overflow: QueueOverflow,
}

impl InboundQueueStore {
    pub fn new(max_len: usize, overflow: QueueOverflow) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            max_len: max_len.max(1),
            overflow,
        }
    }

    /// Append to the recipient's queue. Returns the ID of a message evicted
    /// to make room, if any.
    pub fn push(&self, message: Message) -> Result<Option<MessageId>, AgoraError> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.entry(message.to.clone()).or_default();

        let mut evicted = None;
        if queue.len() >= self.max_len {
            match self.overflow {
                QueueOverflow::RejectNew => {
                    return Err(AgoraError::QueueFull(format!(
                        "recipient {} has {} undelivered messages",
                        message.to.short(),
                        queue.len()
                    )));
                }
                QueueOverflow::DropOldest => {
                    while queue.len() >= self.max_len {
                        if let Some(dropped) = queue.pop_front() {
                            warn!(
                                recipient = %message.to.short(),
                                message_id = %dropped.id,
                                "inbound queue full, dropped oldest message"
                            );
                            evicted = Some(dropped.id);
                        }
                    }
                }
            }
        }

        queue.push_back(message);
        Ok(evicted)
    }

    /// Remove and return everything queued for `key`, oldest first.
    pub fn drain(&self, key: &AgentKey) -> Vec<Message> {
        self.queues
            .lock()
            .unwrap()
            .remove(key)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of undelivered messages for `key`.
    pub fn pending(&self, key: &AgentKey) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(key)
            .map_or(0, VecDeque::len)
    }

    /// Undelivered messages across all recipients.
    pub fn total_pending(&self) -> usize {
        self.queues.lock().unwrap().values().map(VecDeque::len).sum()
    }
}
