//! Conversation orchestration over streaming sessions

use std::sync::{Arc, atomic::Ordering};

use futures::StreamExt;
use rill_wire::{RequestPayload, StreamMode, StreamRequest};
use tokio::sync::broadcast;

use crate::conversation::Conversation;
use crate::error::Result;
use crate::events::{ChatEvent, ChatEventStream, FailureKind, SessionOutcome};
use crate::handle::ChatHandle;
use crate::message::Message;
use crate::session::StreamSession;
use crate::transport::Transport;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// How the endpoint frames its response body
    pub mode: StreamMode,
    /// Stable opaque conversation id sent to NDJSON endpoints; the server
    /// resolves it to conversation context
    pub session_id: String,
}

impl ChatConfig {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            session_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

/// The conversation controller.
///
/// Owns the message list and runs one streaming session at a time. `send`
/// holds `&mut self` until its session reaches a terminal state, so a second
/// send cannot overlap the first; a caller superseding an in-flight send
/// stops it through the handle and waits for idle before sending again.
pub struct ChatClient {
    config: ChatConfig,
    conversation: Conversation,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: ChatHandle,
}

impl ChatClient {
    /// Create a new client
    pub fn new(config: ChatConfig, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config,
            conversation: Conversation::new(),
            transport,
            event_tx,
            handle: ChatHandle::new(),
        }
    }

    /// Subscribe to chat events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.event_tx.subscribe()
    }

    /// Control handle usable from other tasks
    pub fn handle(&self) -> ChatHandle {
        self.handle.clone()
    }

    /// Get the client config
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Messages as they stand now
    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// Cloned snapshot of the conversation
    pub fn snapshot(&self) -> Vec<Message> {
        self.conversation.messages().to_vec()
    }

    /// Whether a session is currently running
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Stop the in-flight session, if any
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Drop all messages
    pub fn clear(&mut self) {
        self.conversation = Conversation::new();
    }

    /// Send a user message and run its response session to a terminal state.
    ///
    /// Appends the user message, opens one streaming session, applies every
    /// patch the session produces, and re-broadcasts every event. The outcome
    /// reports how the session ended; transport failures land there, not in
    /// the error.
    pub async fn send(&mut self, text: impl Into<String>) -> Result<SessionOutcome> {
        let user = Message::user(text);
        self.conversation.push(user.clone());
        let request = self.build_request(&user);

        let mut session = StreamSession::new(request);
        // The handle's slot points at this session's token for the session's
        // lifetime, so a stop aimed at an earlier session cannot kill it.
        *self.handle.cancel.lock() = session.cancel_token();
        self.handle.is_running.store(true, Ordering::Release);
        tracing::debug!(session_id = %session.id(), "send started");

        let result = match session.start(Arc::clone(&self.transport)) {
            Ok(stream) => Ok(self.drive(stream).await),
            Err(err) => Err(err),
        };

        self.handle.is_running.store(false, Ordering::Release);
        self.handle.idle_notify.notify_waiters();
        result
    }

    /// Apply and re-broadcast every event until the session ends
    async fn drive(&mut self, mut stream: ChatEventStream) -> SessionOutcome {
        let mut outcome = None;
        while let Some(event) = stream.next().await {
            if let Some(patch) = event.to_patch() {
                self.conversation.apply(patch);
            }
            if let ChatEvent::SessionEnd { outcome: o, .. } = &event {
                outcome = Some(o.clone());
            }
            let _ = self.event_tx.send(event);
        }
        outcome.unwrap_or_else(|| {
            // A session stream always ends with SessionEnd.
            tracing::warn!("session stream ended without a session end event");
            SessionOutcome::Failed {
                kind: FailureKind::Transport,
                reason: "session ended unexpectedly".to_string(),
            }
        })
    }

    fn build_request(&self, user: &Message) -> StreamRequest {
        let payload = match self.config.mode {
            StreamMode::Ndjson => RequestPayload::Query {
                query: user.text(),
                session_id: self.config.session_id.clone(),
            },
            // Raw-text endpoints get the history echoed back; the user
            // message was already appended, so it is included.
            StreamMode::Text => RequestPayload::Messages {
                messages: self.conversation.to_wire(),
            },
        };
        StreamRequest {
            mode: self.config.mode,
            payload,
        }
    }
}
