//! Typed events decoded from framed response records

use serde::{Deserialize, Serialize};

/// One NDJSON record as the server writes it.
///
/// `data` carries a bare string for chunks and an object for completion,
/// which the tag/content split captures directly. Extra fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
enum WireRecord {
    Chunk(String),
    Complete(CompleteData),
}

#[derive(Debug, Deserialize)]
struct CompleteData {
    #[serde(rename = "finishReason")]
    finish_reason: String,
}

/// A decoded stream event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental text delta
    Chunk { text: String },
    /// The server finished the response
    Complete { finish_reason: String },
    /// A record that could not be understood; consumers skip it
    Malformed { raw: String },
}

impl StreamEvent {
    /// Whether this event ends the logical response
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. })
    }
}

/// Decode one framed line into an event.
///
/// Total: anything that is not a well-formed known record comes back as
/// [`StreamEvent::Malformed`], so a single bad line never takes the stream
/// down. Unrecognized `type` values land there too, which keeps the format
/// open to new record kinds.
pub fn parse_line(line: &str) -> StreamEvent {
    match serde_json::from_str::<WireRecord>(line) {
        Ok(WireRecord::Chunk(text)) => StreamEvent::Chunk { text },
        Ok(WireRecord::Complete(data)) => StreamEvent::Complete {
            finish_reason: data.finish_reason,
        },
        Err(_) => StreamEvent::Malformed {
            raw: line.to_string(),
        },
    }
}
