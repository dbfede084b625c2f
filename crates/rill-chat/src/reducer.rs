//! Pure fold from stream events to conversation patches

use rill_wire::StreamEvent;

use crate::message::{Message, MessageId, MessageStatus};

/// A minimal description of one conversation mutation.
///
/// Patches are the only way session output reaches the message list. Updates
/// and finalizes target messages by id, so a patch from a stale session can
/// never touch a message some newer session created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Append a new message to the list
    Insert(Message),
    /// Append a delta to the identified message's final text part
    UpdateLast { message_id: MessageId, delta: String },
    /// Move the identified message to a terminal status
    Finalize {
        message_id: MessageId,
        status: MessageStatus,
    },
}

/// Why the event stream stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The body ended normally
    EndOfInput,
    /// The user cancelled the session
    Cancelled,
    /// The transport broke
    Failed,
}

/// Folds stream events into patches for one session.
///
/// The reducer owns its accumulating copy of the assistant message and never
/// holds a reference into the conversation list. It is synchronous and does
/// no I/O, so every ordering case is testable without a runtime.
///
/// The first chunk creates the message; later chunks extend it; a completion
/// seals it. Anything arriving after the seal folds to nothing.
#[derive(Debug, Default)]
pub struct StreamReducer {
    message: Option<Message>,
    finalized: bool,
    finish_reason: Option<String>,
}

impl StreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated assistant message, if any chunk arrived yet
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Finish reason reported by an explicit completion record
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Whether a completion (explicit or folded) was seen already
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Fold one event into at most one patch
    pub fn reduce(&mut self, event: &StreamEvent) -> Option<Patch> {
        match event {
            StreamEvent::Chunk { text } => {
                if self.finalized {
                    tracing::debug!("discarding chunk after completion");
                    return None;
                }
                match &mut self.message {
                    None => {
                        let message = Message::streaming(text.clone());
                        self.message = Some(message.clone());
                        Some(Patch::Insert(message))
                    }
                    Some(message) => {
                        message.push_delta(text);
                        Some(Patch::UpdateLast {
                            message_id: message.id,
                            delta: text.clone(),
                        })
                    }
                }
            }
            StreamEvent::Complete { finish_reason } => {
                // Repeated completion is a no-op.
                if self.finalized {
                    return None;
                }
                self.finalized = true;
                self.finish_reason = Some(finish_reason.clone());
                self.message.as_mut().map(|message| {
                    message.status = MessageStatus::Complete;
                    Patch::Finalize {
                        message_id: message.id,
                        status: MessageStatus::Complete,
                    }
                })
            }
            StreamEvent::Malformed { .. } => None,
        }
    }

    /// Fold the end of the stream.
    ///
    /// End of input and user cancel keep whatever text arrived and seal the
    /// message complete; a transport failure seals it failed. When the stream
    /// dies before producing anything, a failed message is synthesized so the
    /// conversation records the exchange instead of leaving a hole. A cancel
    /// before the first chunk synthesizes nothing; the session outcome is the
    /// only signal needed.
    pub fn close(&mut self, reason: CloseReason) -> Vec<Patch> {
        if self.finalized {
            return Vec::new();
        }
        self.finalized = true;
        match (&mut self.message, reason) {
            (Some(message), CloseReason::EndOfInput | CloseReason::Cancelled) => {
                message.status = MessageStatus::Complete;
                vec![Patch::Finalize {
                    message_id: message.id,
                    status: MessageStatus::Complete,
                }]
            }
            (Some(message), CloseReason::Failed) => {
                message.status = MessageStatus::Failed;
                vec![Patch::Finalize {
                    message_id: message.id,
                    status: MessageStatus::Failed,
                }]
            }
            (None, CloseReason::EndOfInput | CloseReason::Failed) => {
                let message = Message::failed();
                let message_id = message.id;
                self.message = Some(message.clone());
                vec![
                    Patch::Insert(message),
                    Patch::Finalize {
                        message_id,
                        status: MessageStatus::Failed,
                    },
                ]
            }
            (None, CloseReason::Cancelled) => Vec::new(),
        }
    }
}
