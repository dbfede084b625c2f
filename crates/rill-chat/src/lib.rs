//! rill-chat: Conversation state over streaming responses
//!
//! This crate folds the typed stream events produced by `rill-wire` into an
//! append-only conversation: a cancellable session per send, a pure reducer
//! from events to message patches, and a client that owns the message list
//! and broadcasts progress.

pub mod client;
pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;
pub mod message;
pub mod reducer;
pub mod session;
pub mod transport;

pub use client::{ChatClient, ChatConfig};
pub use conversation::Conversation;
pub use error::{Error, Result};
pub use events::{ChatEvent, ChatEventStream, FailureKind, SessionOutcome};
pub use handle::ChatHandle;
pub use message::{Message, MessageId, MessageStatus, Part, Role, SessionId};
pub use reducer::{CloseReason, Patch, StreamReducer};
pub use session::{SessionState, StreamSession};
pub use transport::{HttpTransport, Transport};
