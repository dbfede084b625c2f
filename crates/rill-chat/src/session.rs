//! Streaming session lifecycle

use std::sync::Arc;

use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use rill_wire::{LineFramer, StreamEvent, StreamMode, StreamRequest, Utf8Decoder, parse_line};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::events::{ChatEvent, ChatEventStream, FailureKind, SessionOutcome};
use crate::message::{MessageStatus, SessionId};
use crate::reducer::{CloseReason, Patch, StreamReducer};
use crate::transport::Transport;

/// Where a session is in its lifecycle.
///
/// Terminal states are final; a session never restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Outcome of one read from the body stream
enum ReadStep {
    Data(Bytes),
    EndOfInput,
    Cancelled,
    Failed(String),
}

/// Map a reducer patch to its session event.
///
/// Finalize events carry the full message snapshot; the reducer only
/// finalizes a message it holds.
fn push_patch_event(
    reducer: &StreamReducer,
    patch: Patch,
    session_id: SessionId,
    out: &mut Vec<ChatEvent>,
) {
    match patch {
        Patch::Insert(message) => out.push(ChatEvent::MessageStart {
            session_id,
            message,
        }),
        Patch::UpdateLast { message_id, delta } => out.push(ChatEvent::MessageDelta {
            session_id,
            message_id,
            delta,
        }),
        Patch::Finalize { .. } => {
            if let Some(message) = reducer.message() {
                out.push(ChatEvent::MessageEnd {
                    session_id,
                    message: message.clone(),
                });
            }
        }
    }
}

/// Feed one stream event through the reducer, collecting session events
fn fold_event(
    reducer: &mut StreamReducer,
    event: StreamEvent,
    session_id: SessionId,
    out: &mut Vec<ChatEvent>,
) {
    if let StreamEvent::Malformed { raw } = &event {
        tracing::warn!(%session_id, "skipping malformed record");
        out.push(ChatEvent::MalformedRecord {
            session_id,
            raw: raw.clone(),
        });
    }
    if let Some(patch) = reducer.reduce(&event) {
        push_patch_event(reducer, patch, session_id, out);
    }
}

/// Fold one decoded text chunk into session events, per stream mode
fn fold_chunk(
    reducer: &mut StreamReducer,
    framer: &mut LineFramer,
    mode: StreamMode,
    text: &str,
    session_id: SessionId,
) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    match mode {
        StreamMode::Ndjson => {
            for line in framer.push(text) {
                fold_event(reducer, parse_line(&line), session_id, &mut events);
            }
        }
        StreamMode::Text => {
            if !text.is_empty() {
                fold_event(
                    reducer,
                    StreamEvent::Chunk {
                        text: text.to_string(),
                    },
                    session_id,
                    &mut events,
                );
            }
        }
    }
    events
}

/// Fold the end of the stream into session events
fn close_events(
    reducer: &mut StreamReducer,
    reason: CloseReason,
    session_id: SessionId,
) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    let patches = reducer.close(reason);
    for patch in patches {
        push_patch_event(reducer, patch, session_id, &mut events);
    }
    events
}

fn terminal_state(outcome: &SessionOutcome) -> SessionState {
    match outcome {
        SessionOutcome::Completed { .. } => SessionState::Completed,
        SessionOutcome::Cancelled => SessionState::Cancelled,
        SessionOutcome::Failed { .. } => SessionState::Failed,
    }
}

/// One request/response stream lifecycle.
///
/// A session is created idle, started once, and driven to a terminal state
/// by consuming the event stream `start` returns. Every await in the drive
/// loop races against the session's cancellation token, so a `stop` lands
/// without waiting for the next chunk to arrive.
pub struct StreamSession {
    id: SessionId,
    request: StreamRequest,
    state: Arc<Mutex<SessionState>>,
    cancel: CancellationToken,
    started_at: i64,
}

impl StreamSession {
    pub fn new(request: StreamRequest) -> Self {
        Self {
            id: SessionId::new(),
            request,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            cancel: CancellationToken::new(),
            started_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    /// Token observers can use to stop this session from another task
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the session; idempotent and safe in any state
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Issue the request and return the event stream that drives the
    /// session to a terminal state.
    ///
    /// The stream always ends with exactly one `SessionEnd`. Transport
    /// failures and cancellation are outcomes, not errors; the only error
    /// here is starting a session that already started.
    pub fn start(&mut self, transport: Arc<dyn Transport>) -> Result<ChatEventStream> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Idle {
                return Err(Error::InvalidState { state: *state });
            }
            *state = SessionState::Sending;
        }

        let session_id = self.id;
        let request = self.request.clone();
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        let started_at = self.started_at;

        Ok(Box::pin(stream! {
            let mut reducer = StreamReducer::new();

            tracing::debug!(%session_id, "opening stream");
            let opened = tokio::select! {
                _ = cancel.cancelled() => None,
                result = transport.open(&request) => Some(result),
            };

            let response;
            match opened {
                None => {
                    *state.lock() = SessionState::Cancelled;
                    tracing::debug!(%session_id, "cancelled before response");
                    yield ChatEvent::SessionEnd {
                        session_id,
                        outcome: SessionOutcome::Cancelled,
                    };
                    return;
                }
                Some(Err(err)) => {
                    *state.lock() = SessionState::Failed;
                    tracing::warn!(%session_id, error = %err, "request failed");
                    for event in close_events(&mut reducer, CloseReason::Failed, session_id) {
                        yield event;
                    }
                    yield ChatEvent::SessionEnd {
                        session_id,
                        outcome: SessionOutcome::Failed {
                            kind: FailureKind::Transport,
                            reason: err.to_string(),
                        },
                    };
                    return;
                }
                Some(Ok(resp)) if !(200..300).contains(&resp.status) => {
                    *state.lock() = SessionState::Failed;
                    tracing::warn!(%session_id, status = resp.status, "request rejected");
                    for event in close_events(&mut reducer, CloseReason::Failed, session_id) {
                        yield event;
                    }
                    yield ChatEvent::SessionEnd {
                        session_id,
                        outcome: SessionOutcome::Failed {
                            kind: FailureKind::Transport,
                            reason: format!("HTTP status {}", resp.status),
                        },
                    };
                    return;
                }
                Some(Ok(resp)) => {
                    response = resp;
                }
            }

            *state.lock() = SessionState::Streaming;
            yield ChatEvent::SessionStart { session_id };

            let mode = request.mode;
            let mut bytes = response.bytes;
            let mut decoder = Utf8Decoder::new();
            let mut framer = LineFramer::new();

            loop {
                let step = tokio::select! {
                    _ = cancel.cancelled() => ReadStep::Cancelled,
                    chunk = bytes.next() => match chunk {
                        Some(Ok(data)) => ReadStep::Data(data),
                        Some(Err(err)) => ReadStep::Failed(err.to_string()),
                        None => ReadStep::EndOfInput,
                    },
                };

                match step {
                    ReadStep::Data(data) => {
                        let text = decoder.decode(&data);
                        for event in fold_chunk(&mut reducer, &mut framer, mode, &text, session_id) {
                            yield event;
                        }
                    }
                    ReadStep::EndOfInput => {
                        let tail = decoder.finish();
                        for event in fold_chunk(&mut reducer, &mut framer, mode, &tail, session_id) {
                            yield event;
                        }
                        // End of input stands in for the final terminator.
                        if mode == StreamMode::Ndjson {
                            if let Some(line) = framer.finish() {
                                let mut events = Vec::new();
                                fold_event(&mut reducer, parse_line(&line), session_id, &mut events);
                                for event in events {
                                    yield event;
                                }
                            }
                        }
                        for event in close_events(&mut reducer, CloseReason::EndOfInput, session_id) {
                            yield event;
                        }
                        let outcome = match reducer.message() {
                            Some(m) if m.status == MessageStatus::Complete => {
                                SessionOutcome::Completed {
                                    finish_reason: reducer.finish_reason().map(String::from),
                                }
                            }
                            Some(_) => SessionOutcome::Failed {
                                kind: FailureKind::EmptyStream,
                                reason: "empty stream".to_string(),
                            },
                            None => SessionOutcome::Completed {
                                finish_reason: reducer.finish_reason().map(String::from),
                            },
                        };
                        *state.lock() = terminal_state(&outcome);
                        tracing::debug!(
                            %session_id,
                            elapsed_ms = chrono::Utc::now().timestamp_millis() - started_at,
                            "stream ended"
                        );
                        yield ChatEvent::SessionEnd { session_id, outcome };
                        return;
                    }
                    ReadStep::Cancelled => {
                        let was_finalized = reducer.is_finalized();
                        for event in close_events(&mut reducer, CloseReason::Cancelled, session_id) {
                            yield event;
                        }
                        // A stop that lands after the server already
                        // completed the response does not undo it.
                        let outcome = if was_finalized {
                            SessionOutcome::Completed {
                                finish_reason: reducer.finish_reason().map(String::from),
                            }
                        } else {
                            SessionOutcome::Cancelled
                        };
                        *state.lock() = terminal_state(&outcome);
                        tracing::debug!(%session_id, "session cancelled");
                        yield ChatEvent::SessionEnd { session_id, outcome };
                        return;
                    }
                    ReadStep::Failed(reason) => {
                        if reducer.is_finalized() {
                            tracing::warn!(%session_id, %reason, "transport error after completion");
                            let outcome = SessionOutcome::Completed {
                                finish_reason: reducer.finish_reason().map(String::from),
                            };
                            *state.lock() = terminal_state(&outcome);
                            yield ChatEvent::SessionEnd { session_id, outcome };
                            return;
                        }
                        tracing::warn!(%session_id, %reason, "stream failed");
                        for event in close_events(&mut reducer, CloseReason::Failed, session_id) {
                            yield event;
                        }
                        let outcome = SessionOutcome::Failed {
                            kind: FailureKind::Transport,
                            reason,
                        };
                        *state.lock() = terminal_state(&outcome);
                        yield ChatEvent::SessionEnd { session_id, outcome };
                        return;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockTransport, Script, ok_chunks};
    use rill_wire::RequestPayload;

    fn make_request(mode: StreamMode) -> StreamRequest {
        StreamRequest {
            mode,
            payload: RequestPayload::Query {
                query: "hi".to_string(),
                session_id: "conv-1".to_string(),
            },
        }
    }

    /// Body items, one newline-terminated record per item
    fn lines(records: &[&str]) -> Vec<rill_wire::Result<Bytes>> {
        records
            .iter()
            .map(|r| Ok(Bytes::from(format!("{r}\n"))))
            .collect()
    }

    async fn run_session(
        transport: Arc<MockTransport>,
        mode: StreamMode,
    ) -> (StreamSession, Vec<ChatEvent>) {
        let mut session = StreamSession::new(make_request(mode));
        let stream = session.start(transport).unwrap();
        let events: Vec<ChatEvent> = stream.collect().await;
        (session, events)
    }

    #[tokio::test]
    async fn test_ndjson_stream_end_to_end() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: lines(&[
                r#"{"type":"chunk","data":"Hel"}"#,
                r#"{"type":"chunk","data":"lo"}"#,
                r#"{"type":"complete","data":{"finishReason":"stop"}}"#,
            ]),
            hang_after: false,
        });
        let (session, events) = run_session(transport, StreamMode::Ndjson).await;

        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], ChatEvent::SessionStart { .. }));
        match &events[1] {
            ChatEvent::MessageStart { message, .. } => {
                assert_eq!(message.text(), "Hel");
                assert_eq!(message.status, MessageStatus::Streaming);
            }
            other => panic!("expected message start, got {other:?}"),
        }
        match &events[2] {
            ChatEvent::MessageDelta { delta, .. } => assert_eq!(delta, "lo"),
            other => panic!("expected delta, got {other:?}"),
        }
        match &events[3] {
            ChatEvent::MessageEnd { message, .. } => {
                assert_eq!(message.text(), "Hello");
                assert_eq!(message.status, MessageStatus::Complete);
            }
            other => panic!("expected message end, got {other:?}"),
        }
        match &events[4] {
            ChatEvent::SessionEnd { outcome, .. } => {
                assert_eq!(
                    *outcome,
                    SessionOutcome::Completed {
                        finish_reason: Some("stop".to_string()),
                    }
                );
            }
            other => panic!("expected session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(events[0].session_id(), session.id());
    }

    #[tokio::test]
    async fn test_record_split_across_reads_emitted_once() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: ok_chunks(&[r#"{"type":"chunk","da"#, "ta\":\"Hi\"}\n"]),
            hang_after: false,
        });
        let (_, events) = run_session(transport, StreamMode::Ndjson).await;

        let starts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::MessageStart { message, .. } => Some(message.text()),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec!["Hi"]);
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_byte_chunks() {
        let line = "{\"type\":\"chunk\",\"data\":\"\u{4E2D}\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xE4).unwrap() + 1;
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: vec![
                Ok(Bytes::copy_from_slice(&line[..split])),
                Ok(Bytes::copy_from_slice(&line[split..])),
            ],
            hang_after: false,
        });
        let (_, events) = run_session(transport, StreamMode::Ndjson).await;

        match &events[1] {
            ChatEvent::MessageStart { message, .. } => {
                assert_eq!(message.text(), "\u{4E2D}");
                assert!(!message.text().contains('\u{FFFD}'));
            }
            other => panic!("expected message start, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_text_mode_each_chunk_is_a_delta() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: ok_chunks(&["Hi ", "there"]),
            hang_after: false,
        });
        let (session, events) = run_session(transport, StreamMode::Text).await;

        assert!(matches!(events[0], ChatEvent::SessionStart { .. }));
        assert!(matches!(events[1], ChatEvent::MessageStart { .. }));
        assert!(matches!(events[2], ChatEvent::MessageDelta { .. }));
        match &events[3] {
            ChatEvent::MessageEnd { message, .. } => {
                assert_eq!(message.text(), "Hi there");
                assert_eq!(message.status, MessageStatus::Complete);
            }
            other => panic!("expected message end, got {other:?}"),
        }
        match &events[4] {
            ChatEvent::SessionEnd { outcome, .. } => {
                assert_eq!(
                    *outcome,
                    SessionOutcome::Completed { finish_reason: None }
                );
            }
            other => panic!("expected session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_unterminated_final_record_is_parsed() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: ok_chunks(&[r#"{"type":"chunk","data":"Hi"}"#]),
            hang_after: false,
        });
        let (_, events) = run_session(transport, StreamMode::Ndjson).await;

        match &events[1] {
            ChatEvent::MessageStart { message, .. } => assert_eq!(message.text(), "Hi"),
            other => panic!("expected message start, got {other:?}"),
        }
        match events.last() {
            Some(ChatEvent::SessionEnd { outcome, .. }) => {
                assert_eq!(
                    *outcome,
                    SessionOutcome::Completed { finish_reason: None }
                );
            }
            other => panic!("expected session end, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_record_skipped_stream_continues() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: lines(&[
                "not json at all",
                r#"{"type":"chunk","data":"ok"}"#,
                r#"{"type":"complete","data":{"finishReason":"stop"}}"#,
            ]),
            hang_after: false,
        });
        let (_, events) = run_session(transport, StreamMode::Ndjson).await;

        match &events[1] {
            ChatEvent::MalformedRecord { raw, .. } => assert_eq!(raw, "not json at all"),
            other => panic!("expected malformed record, got {other:?}"),
        }
        match &events[2] {
            ChatEvent::MessageStart { message, .. } => assert_eq!(message.text(), "ok"),
            other => panic!("expected message start, got {other:?}"),
        }
        match events.last() {
            Some(ChatEvent::SessionEnd { outcome, .. }) => {
                assert!(matches!(outcome, SessionOutcome::Completed { .. }));
            }
            other => panic!("expected session end, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_records_after_complete_are_ignored() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: lines(&[
                r#"{"type":"chunk","data":"a"}"#,
                r#"{"type":"complete","data":{"finishReason":"stop"}}"#,
                r#"{"type":"chunk","data":"late"}"#,
            ]),
            hang_after: false,
        });
        let (_, events) = run_session(transport, StreamMode::Ndjson).await;

        let deltas = events
            .iter()
            .filter(|e| matches!(e, ChatEvent::MessageDelta { .. }))
            .count();
        assert_eq!(deltas, 0);
        let ends: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::MessageEnd { message, .. } => Some(message.text()),
                _ => None,
            })
            .collect();
        assert_eq!(ends, vec!["a"]);
    }

    #[tokio::test]
    async fn test_http_500_fails_without_processing_body() {
        let transport = MockTransport::single(Script::Respond {
            status: 500,
            body: ok_chunks(&["Internal Server Error"]),
            hang_after: false,
        });
        let (session, events) = run_session(transport, StreamMode::Ndjson).await;

        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ChatEvent::SessionStart { .. }))
        );
        match &events[0] {
            ChatEvent::MessageStart { message, .. } => {
                assert_eq!(message.status, MessageStatus::Failed);
            }
            other => panic!("expected message start, got {other:?}"),
        }
        match events.last() {
            Some(ChatEvent::SessionEnd { outcome, .. }) => {
                assert_eq!(
                    *outcome,
                    SessionOutcome::Failed {
                        kind: FailureKind::Transport,
                        reason: "HTTP status 500".to_string(),
                    }
                );
            }
            other => panic!("expected session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_connect_error_fails() {
        let transport = MockTransport::single(Script::ConnectError(
            "connection refused".to_string(),
        ));
        let (session, events) = run_session(transport, StreamMode::Ndjson).await;

        match events.last() {
            Some(ChatEvent::SessionEnd {
                outcome: SessionOutcome::Failed { kind, reason },
                ..
            }) => {
                assert_eq!(*kind, FailureKind::Transport);
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected failed session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_mid_stream_error_finalizes_failed() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: vec![
                Ok(Bytes::from(format!("{}\n", r#"{"type":"chunk","data":"Hel"}"#))),
                Err(rill_wire::Error::stream("connection reset")),
            ],
            hang_after: false,
        });
        let (session, events) = run_session(transport, StreamMode::Ndjson).await;

        match &events[2] {
            ChatEvent::MessageEnd { message, .. } => {
                assert_eq!(message.text(), "Hel");
                assert_eq!(message.status, MessageStatus::Failed);
            }
            other => panic!("expected message end, got {other:?}"),
        }
        match events.last() {
            Some(ChatEvent::SessionEnd {
                outcome: SessionOutcome::Failed { kind, reason },
                ..
            }) => {
                assert_eq!(*kind, FailureKind::Transport);
                assert!(reason.contains("connection reset"));
            }
            other => panic!("expected failed session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_empty_stream_fails_with_reason() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: vec![],
            hang_after: false,
        });
        let (session, events) = run_session(transport, StreamMode::Ndjson).await;

        assert!(matches!(events[0], ChatEvent::SessionStart { .. }));
        match &events[1] {
            ChatEvent::MessageStart { message, .. } => {
                assert_eq!(message.status, MessageStatus::Failed);
            }
            other => panic!("expected message start, got {other:?}"),
        }
        match events.last() {
            Some(ChatEvent::SessionEnd { outcome, .. }) => {
                assert_eq!(
                    *outcome,
                    SessionOutcome::Failed {
                        kind: FailureKind::EmptyStream,
                        reason: "empty stream".to_string(),
                    }
                );
            }
            other => panic!("expected session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_start_twice_is_invalid_state() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: vec![],
            hang_after: false,
        });
        let mut session = StreamSession::new(make_request(StreamMode::Ndjson));
        let _stream = session.start(transport.clone()).unwrap();
        let err = session.start(transport).err().unwrap();
        assert!(matches!(
            err,
            Error::InvalidState {
                state: SessionState::Sending,
            }
        ));
    }

    #[tokio::test]
    async fn test_stop_before_response_cancels() {
        let transport = MockTransport::single(Script::Hang);
        let mut session = StreamSession::new(make_request(StreamMode::Ndjson));
        let stream = session.start(transport).unwrap();
        session.stop();
        // Second stop is a no-op.
        session.stop();
        let events: Vec<ChatEvent> = stream.collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ChatEvent::SessionEnd {
                outcome: SessionOutcome::Cancelled,
                ..
            }
        ));
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_stop_before_first_chunk_leaves_no_message() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: vec![],
            hang_after: true,
        });
        let mut session = StreamSession::new(make_request(StreamMode::Ndjson));
        let mut stream = session.start(transport).unwrap();
        assert!(matches!(
            stream.next().await,
            Some(ChatEvent::SessionStart { .. })
        ));
        session.stop();
        match stream.next().await {
            Some(ChatEvent::SessionEnd { outcome, .. }) => {
                assert_eq!(outcome, SessionOutcome::Cancelled);
            }
            other => panic!("expected session end, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_stop_mid_stream_keeps_partial_as_complete() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: lines(&[r#"{"type":"chunk","data":"par"}"#]),
            hang_after: true,
        });
        let mut session = StreamSession::new(make_request(StreamMode::Ndjson));
        let mut stream = session.start(transport).unwrap();
        assert!(matches!(
            stream.next().await,
            Some(ChatEvent::SessionStart { .. })
        ));
        assert!(matches!(
            stream.next().await,
            Some(ChatEvent::MessageStart { .. })
        ));
        session.stop();
        match stream.next().await {
            Some(ChatEvent::MessageEnd { message, .. }) => {
                assert_eq!(message.text(), "par");
                assert_eq!(message.status, MessageStatus::Complete);
            }
            other => panic!("expected message end, got {other:?}"),
        }
        match stream.next().await {
            Some(ChatEvent::SessionEnd { outcome, .. }) => {
                assert_eq!(outcome, SessionOutcome::Cancelled);
            }
            other => panic!("expected session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_stop_after_complete_reports_completed() {
        let transport = MockTransport::single(Script::Respond {
            status: 200,
            body: lines(&[
                r#"{"type":"chunk","data":"done"}"#,
                r#"{"type":"complete","data":{"finishReason":"stop"}}"#,
            ]),
            hang_after: true,
        });
        let mut session = StreamSession::new(make_request(StreamMode::Ndjson));
        let mut stream = session.start(transport).unwrap();
        loop {
            match stream.next().await {
                Some(ChatEvent::MessageEnd { message, .. }) => {
                    assert_eq!(message.status, MessageStatus::Complete);
                    break;
                }
                Some(_) => continue,
                None => panic!("stream ended before message end"),
            }
        }
        session.stop();
        match stream.next().await {
            Some(ChatEvent::SessionEnd { outcome, .. }) => {
                assert_eq!(
                    outcome,
                    SessionOutcome::Completed {
                        finish_reason: Some("stop".to_string()),
                    }
                );
            }
            other => panic!("expected session end, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Completed);
    }
}
