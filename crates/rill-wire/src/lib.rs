//! rill-wire: wire layer for streaming chat endpoints
//!
//! Turns a streaming HTTP response body into typed events: bytes are decoded
//! incrementally ([`decode::Utf8Decoder`]), framed into lines
//! ([`frame::LineFramer`]), and parsed into [`event::StreamEvent`]s. The
//! [`client::StreamingClient`] opens the response; everything downstream of
//! the body is plain synchronous code.

pub mod client;
pub mod decode;
pub mod error;
pub mod event;
pub mod frame;

pub use client::{
    ByteStream, ClientConfig, RequestPayload, StreamMode, StreamRequest, StreamingClient,
    StreamingResponse, WireMessage, WirePart,
};
pub use decode::Utf8Decoder;
pub use error::{Error, Result};
pub use event::{StreamEvent, parse_line};
pub use frame::LineFramer;
