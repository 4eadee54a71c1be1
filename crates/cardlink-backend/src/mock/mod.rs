//! Mock backend for testing and development.
//!
//! The mock runs the whole backend contract in memory and is driven from a
//! paired handle, so orchestration logic can be exercised without readers.

pub mod backend;

pub use backend::{BackendCall, MockBackend, MockBackendHandle};
