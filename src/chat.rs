use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use warp::ws::Message;

use crate::id::ParticipantId;

/// A chat message as delivered to clients: who sent it, and its body.
///
/// Not persisted beyond this in-memory hop — there is no message history or
/// room scoping, matching the naive broadcast hub this was distilled from.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub sender_id: String,
    pub content: String,
}

/// A naive broadcast chat hub: every registered client receives every
/// message, regardless of which room (if any) it came from. Delivery is
/// best-effort — a client whose outbound channel is closed or full is
/// dropped from the registry on the next failed send rather than causing the
/// whole broadcast to fail.
#[derive(Default)]
pub struct ChatHub {
    clients: DashMap<ParticipantId, UnboundedSender<Message>>,
}

impl ChatHub {
    pub fn new() -> Self {
        ChatHub {
            clients: DashMap::new(),
        }
    }

    pub fn register(&self, participant_id: ParticipantId, sender: UnboundedSender<Message>) {
        self.clients.insert(participant_id, sender);
    }

    pub fn unregister(&self, participant_id: &ParticipantId) {
        self.clients.remove(participant_id);
    }

    /// Sends `content` from `sender_id` to every registered client. Content
    /// must be non-empty; empty messages are silently dropped.
    pub fn broadcast(&self, sender_id: &ParticipantId, content: String) {
        if content.is_empty() {
            return;
        }

        let message = ChatMessage {
            sender_id: sender_id.to_string(),
            content,
        };
        let Ok(json) = serde_json::to_string(&message) else {
            return;
        };

        let mut dead = Vec::new();
        for entry in self.clients.iter() {
            if entry.value().send(Message::text(json.clone())).is_err() {
                dead.push(entry.key().clone());
            }
        }
        for participant_id in dead {
            debug!(participant = %participant_id, "dropping chat client with closed channel");
            self.clients.remove(&participant_id);
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
