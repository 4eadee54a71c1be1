//! Errors raised by the orchestration layer.

use cardlink_backend::BackendError;
use thiserror::Error;

/// Result type alias for terminal operations.
pub type Result<T> = std::result::Result<T, TerminalError>;

/// Errors that can occur in terminal operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerminalError {
    /// An operation was called before `initialize` completed.
    #[error("Terminal must be initialized before calling this method")]
    Uninitialized,

    /// `initialize` was polled outside a Tokio runtime, so there is nowhere
    /// to run token exchanges and discovery.
    #[error("Terminal must be initialized within a Tokio runtime")]
    NoRuntime,

    /// The primary discovery call failed.
    #[error("Discovery failed: {0}")]
    Discovery(BackendError),

    /// A backend operation failed. The backend's error passes through as is.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl TerminalError {
    /// The backend error behind this error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            TerminalError::Uninitialized | TerminalError::NoRuntime => None,
            TerminalError::Discovery(error) | TerminalError::Backend(error) => Some(error),
        }
    }
}
