//! Transport seam between sessions and the network

use async_trait::async_trait;
use rill_wire::{ClientConfig, StreamRequest, StreamingClient, StreamingResponse};

/// How a session opens a response stream.
///
/// Sessions consume raw byte streams through this trait rather than calling
/// the HTTP client directly, so tests can script any byte sequence, stall, or
/// failure without a server.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> rill_wire::Result<StreamingResponse>;
}

/// Production transport backed by the streaming HTTP client
pub struct HttpTransport {
    client: StreamingClient,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: StreamingClient::new(config),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &StreamRequest) -> rill_wire::Result<StreamingResponse> {
        self.client.open(request).await
    }
}
