//! Shared constants for the card reader orchestration layer.
//!
//! Event names are the exact strings backends use on their event bridge, so
//! they must not be changed independently of the backends. Messages are the
//! strings routed into a backend when a connection token cannot be supplied.
//!
//! # Usage
//!
//! ```
//! use cardlink_core::constants::*;
//!
//! assert_eq!(EVENT_READERS_DISCOVERED, "readersDiscovered");
//! assert!(TOKEN_MISSING_MESSAGE.contains("no token was returned"));
//! ```

// ============================================================================
// Backend Event Names
// ============================================================================

/// A backend needs a fresh connection token.
pub const EVENT_REQUEST_CONNECTION_TOKEN: &str = "requestConnectionToken";

/// The connected reader went away without a disconnect request.
pub const EVENT_UNEXPECTED_READER_DISCONNECT: &str = "didReportUnexpectedReaderDisconnect";

/// A discovery tick with the current list of readers.
pub const EVENT_READERS_DISCOVERED: &str = "readersDiscovered";

/// The reader connection status changed.
pub const EVENT_CONNECTION_STATUS_CHANGED: &str = "didChangeConnectionStatus";

/// The reader asks the customer for card input.
pub const EVENT_READER_INPUT_REQUESTED: &str = "didRequestReaderInput";

/// The reader asks the host to show a message.
pub const EVENT_READER_DISPLAY_MESSAGE_REQUESTED: &str = "didRequestReaderDisplayMessage";

/// A reader software update is available.
pub const EVENT_AVAILABLE_UPDATE_REPORTED: &str = "didReportAvailableUpdate";

/// A reader software update started installing.
pub const EVENT_INSTALLING_UPDATE_STARTED: &str = "didStartInstallingUpdate";

/// Progress of the reader software update being installed.
pub const EVENT_SOFTWARE_UPDATE_PROGRESS: &str = "didReportReaderSoftwareUpdateProgress";

/// A reader software update finished installing (successfully or not).
pub const EVENT_INSTALLING_UPDATE_FINISHED: &str = "didFinishInstallingUpdate";

// ============================================================================
// Connection Token Messages
// ============================================================================

/// Delivered to a backend when the token callback resolved to an empty token.
pub const TOKEN_MISSING_MESSAGE: &str = "User-supplied `fetchConnectionToken` resolved successfully, but no token was returned.";

/// Delivered to a backend when the token callback failed without a message.
pub const TOKEN_FETCH_FAILED_MESSAGE: &str = "Error in user-supplied `fetchConnectionToken`.";

// ============================================================================
// Reader Normalization
// ============================================================================

/// Software version string some backends report instead of omitting the field.
pub const UNKNOWN_SOFTWARE_VERSION: &str = "unknown";
