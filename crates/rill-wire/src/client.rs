//! HTTP client for streaming chat endpoints

use std::collections::HashMap;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::error::{Error, Result};

/// Boxed stream of raw body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// How the response body is framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// One JSON record per line
    Ndjson,
    /// Unframed text; every decoded chunk is a delta
    Text,
}

/// Request body variants.
///
/// NDJSON endpoints take a query plus an opaque conversation id the server
/// resolves to context. Raw-text endpoints take the prior turns echoed back
/// instead.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Query {
        query: String,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Messages {
        messages: Vec<WireMessage>,
    },
}

/// A prior turn as the wire carries it
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub parts: Vec<WirePart>,
}

/// A typed content part on the wire
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WirePart {
    Text { text: String },
}

/// One streaming request
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub mode: StreamMode,
    pub payload: RequestPayload,
}

/// Endpoint configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the streaming endpoint
    pub endpoint: String,
    /// Extra headers sent with every request; auth material is the caller's
    /// concern, not this crate's
    pub headers: HashMap<String, String>,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: HashMap::new(),
        }
    }
}

/// Raw response handle: the status code plus the unconsumed body.
///
/// Status classification is left to the consumer so failure paths stay
/// reachable from mocks.
pub struct StreamingResponse {
    pub status: u16,
    pub bytes: ByteStream,
}

/// Thin reqwest wrapper that opens streaming responses
#[derive(Debug, Clone)]
pub struct StreamingClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl StreamingClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// POST the request and hand back the status plus the body stream.
    ///
    /// Errors here are connection-level; a non-success status comes back as
    /// a normal response for the session to classify.
    pub async fn open(&self, request: &StreamRequest) -> Result<StreamingResponse> {
        let mut req = self
            .http
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json");

        if request.mode == StreamMode::Ndjson {
            req = req.header("Accept", "application/x-ndjson");
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.json(&request.payload).send().await?;
        let status = response.status().as_u16();
        tracing::debug!(status, endpoint = %self.config.endpoint, "response headers received");

        let bytes = response.bytes_stream().map(|item| item.map_err(Error::from));
        Ok(StreamingResponse {
            status,
            bytes: Box::pin(bytes),
        })
    }
}
