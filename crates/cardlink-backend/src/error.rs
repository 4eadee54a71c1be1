//! Error types for backend operations.
//!
//! Backend errors are surfaced to callers of the orchestration layer
//! unchanged, so they are `Clone` and comparable.

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors a backend reports for one of its operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend refused or failed the operation.
    #[error("{operation} failed: {message}")]
    Rejected { operation: String, message: String },

    /// The backend does not implement this operation.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The operation was canceled before it finished.
    #[error("{operation} was canceled")]
    Canceled { operation: String },

    /// The backend has not finished its own initialization.
    #[error("Backend is not initialized")]
    NotInitialized,

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create a new rejected operation error.
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new canceled operation error.
    pub fn canceled(operation: impl Into<String>) -> Self {
        Self::Canceled {
            operation: operation.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether the error reports a cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}

/// Failure routed into a backend's `set_connection_token` when no token
/// could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TokenFetchError {
    message: String,
}

impl TokenFetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The fetch resolved, but to an empty token.
    pub fn missing_token() -> Self {
        Self::new(cardlink_core::constants::TOKEN_MISSING_MESSAGE)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for TokenFetchError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for TokenFetchError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
