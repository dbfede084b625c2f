//! Error types for rill-wire

use thiserror::Error;

/// Result type alias using rill-wire Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or reading a streaming response
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The body stream broke mid-read
    #[error("stream error: {0}")]
    Stream(String),
}

impl Error {
    /// Create a mid-stream error from a message
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }
}
