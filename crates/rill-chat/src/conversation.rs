//! Ordered message list and patch application

use crate::message::{Message, MessageId, Part, Role};
use crate::reducer::Patch;

/// The ordered list of messages for one chat.
///
/// All mutation goes through [`Conversation::push`] for user messages and
/// [`Conversation::apply`] for session patches. Patches address messages by
/// id, never by position, so replies landing out of order or after a
/// supersede cannot corrupt unrelated messages.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message directly, outside any session
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply one patch produced by a streaming session.
    ///
    /// Unknown ids and deltas aimed at already terminal messages are dropped
    /// with a warning rather than surfaced as errors; a patch arriving after
    /// its message was superseded is late, not wrong.
    pub fn apply(&mut self, patch: Patch) {
        match patch {
            Patch::Insert(message) => self.messages.push(message),
            Patch::UpdateLast { message_id, delta } => {
                let Some(message) = self.find_mut(message_id) else {
                    tracing::warn!(%message_id, "update for unknown message dropped");
                    return;
                };
                if message.status.is_terminal() {
                    tracing::warn!(%message_id, "update for finalized message dropped");
                    return;
                }
                message.push_delta(&delta);
            }
            Patch::Finalize { message_id, status } => {
                let Some(message) = self.find_mut(message_id) else {
                    tracing::warn!(%message_id, "finalize for unknown message dropped");
                    return;
                };
                message.status = status;
            }
        }
    }

    /// Messages in wire form, for echoing history back to the server.
    ///
    /// Messages without content (synthesized failure placeholders) are
    /// skipped; there is nothing for the server to read from them.
    pub fn to_wire(&self) -> Vec<rill_wire::WireMessage> {
        self.messages
            .iter()
            .filter(|message| !message.parts.is_empty())
            .map(|message| rill_wire::WireMessage {
                role: message.role.as_str().to_string(),
                parts: message
                    .parts
                    .iter()
                    .map(|part| match part {
                        Part::Text { text } => rill_wire::WirePart::Text { text: text.clone() },
                    })
                    .collect(),
            })
            .collect()
    }

    /// Latest assistant message, if any
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    fn find_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        // Session patches nearly always target the newest message.
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }
}
