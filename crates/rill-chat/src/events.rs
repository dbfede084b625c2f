//! Events emitted while a chat session runs

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::message::{Message, MessageId, SessionId};
use crate::reducer::Patch;

/// What a finished session left behind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The response finished, explicitly or by the stream ending
    Completed {
        /// Reason reported by the server, absent when the stream just ended
        finish_reason: Option<String>,
    },
    /// The user stopped the session before it finished
    Cancelled,
    /// The session died without a usable response
    Failed { kind: FailureKind, reason: String },
}

/// Broad classification of session failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connect error, non-success status, or mid-stream transport error
    Transport,
    /// The stream ended before any response content arrived
    EmptyStream,
}

/// One observable step of a streaming session.
///
/// Every event names its session, so a subscriber watching across a
/// supersede can tell stale events from live ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The request was accepted and the response stream is open
    SessionStart { session_id: SessionId },
    /// The first content chunk arrived and created the assistant message
    MessageStart {
        session_id: SessionId,
        message: Message,
    },
    /// Another content chunk extended the assistant message
    MessageDelta {
        session_id: SessionId,
        message_id: MessageId,
        delta: String,
    },
    /// The assistant message reached a terminal status; carries the final
    /// snapshot
    MessageEnd {
        session_id: SessionId,
        message: Message,
    },
    /// A line arrived that was not a recognizable record
    MalformedRecord { session_id: SessionId, raw: String },
    /// The session is over; always the last event of a session
    SessionEnd {
        session_id: SessionId,
        outcome: SessionOutcome,
    },
}

impl ChatEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            ChatEvent::SessionStart { session_id }
            | ChatEvent::MessageStart { session_id, .. }
            | ChatEvent::MessageDelta { session_id, .. }
            | ChatEvent::MessageEnd { session_id, .. }
            | ChatEvent::MalformedRecord { session_id, .. }
            | ChatEvent::SessionEnd { session_id, .. } => *session_id,
        }
    }

    /// The conversation patch this event carries, if it carries one
    pub fn to_patch(&self) -> Option<Patch> {
        match self {
            ChatEvent::MessageStart { message, .. } => Some(Patch::Insert(message.clone())),
            ChatEvent::MessageDelta {
                message_id, delta, ..
            } => Some(Patch::UpdateLast {
                message_id: *message_id,
                delta: delta.clone(),
            }),
            ChatEvent::MessageEnd { message, .. } => Some(Patch::Finalize {
                message_id: message.id,
                status: message.status,
            }),
            ChatEvent::SessionStart { .. }
            | ChatEvent::MalformedRecord { .. }
            | ChatEvent::SessionEnd { .. } => None,
        }
    }
}

/// Stream of chat events for one session
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;
