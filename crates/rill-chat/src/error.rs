//! Error types for the chat crate

use thiserror::Error;

use crate::session::SessionState;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by chat operations.
///
/// Transport and protocol failures inside a running session are not errors
/// here; they end the session with a `Failed` outcome instead. The only
/// fallible operation is starting a session from the wrong state.
#[derive(Debug, Error)]
pub enum Error {
    #[error("session cannot start from state {state:?}")]
    InvalidState { state: SessionState },
}
