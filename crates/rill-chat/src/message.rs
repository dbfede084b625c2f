//! Conversation message model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique id of one streaming session (one request/response exchange)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Typed content parts.
///
/// Text is the only kind today; the list keeps the message shape stable when
/// other kinds arrive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Get text if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
        }
    }
}

/// Lifecycle status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created, no content yet
    Pending,
    /// Receiving deltas
    Streaming,
    /// Finished normally
    Complete,
    /// Finished with an error
    Failed,
}

impl MessageStatus {
    /// Whether the message can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Complete | MessageStatus::Failed)
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    /// Ordered content parts
    pub parts: Vec<Part>,
    pub status: MessageStatus,
    /// Creation time, unix millis
    pub created_at: i64,
}

impl Message {
    fn new(role: Role, parts: Vec<Part>, status: MessageStatus) -> Self {
        Self {
            id: MessageId::new(),
            role,
            parts,
            status,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a complete user message
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)], MessageStatus::Complete)
    }

    /// Create an assistant message that is receiving deltas
    pub fn streaming(text: impl Into<String>) -> Self {
        Self::new(
            Role::Assistant,
            vec![Part::text(text)],
            MessageStatus::Streaming,
        )
    }

    /// Create an empty assistant placeholder, for callers that render a slot
    /// before the first delta arrives
    pub fn pending() -> Self {
        Self::new(Role::Assistant, vec![], MessageStatus::Pending)
    }

    /// Create an assistant message already failed (the exchange produced
    /// nothing usable)
    pub fn failed() -> Self {
        Self::new(Role::Assistant, vec![], MessageStatus::Failed)
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Append a delta to the final text part.
    ///
    /// Crate-internal: the conversation list is mutated through patches only.
    pub(crate) fn push_delta(&mut self, delta: &str) {
        match self.parts.last_mut() {
            Some(Part::Text { text }) => text.push_str(delta),
            None => self.parts.push(Part::text(delta)),
        }
    }
}
