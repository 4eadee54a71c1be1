//! Backend contract for the cardlink reader orchestration layer.
//!
//! A backend is an opaque capability provider that knows how to reach card
//! readers: an in-process hardware SDK, or a browser-hosted SDK that reaches
//! network-attached readers. This crate defines what the orchestration layer
//! expects from one:
//!
//! - [`TerminalBackend`]: every operation, as native async trait methods.
//! - [`EventName`] and [`BackendEvent`]: the ten events a backend emits.
//! - [`ListenerHandle`]: the releasable result of subscribing to an event.
//! - [`ListenerRegistry`]: a listener table backends can embed.
//! - [`AnyBackend`]: enum dispatch over two backend types.
//! - [`mock::MockBackend`]: a scriptable in-memory backend.
//!
//! # Examples
//!
//! ```no_run
//! use cardlink_backend::{BackendEvent, EventName, TerminalBackend};
//! use std::sync::Arc;
//!
//! fn watch_tokens<B: TerminalBackend>(backend: &B) -> cardlink_backend::ListenerHandle {
//!     backend.add_listener(
//!         EventName::RequestConnectionToken,
//!         Arc::new(|event: &BackendEvent| println!("{:?}", event.name())),
//!     )
//! }
//! ```
//!
//! # Error Handling
//!
//! Operations return [`Result<T>`][error::Result] with [`BackendError`]. The
//! orchestration layer passes these errors to its callers unchanged.

pub mod dispatch;
pub mod error;
pub mod events;
pub mod listener;
pub mod mock;
pub mod traits;

pub use dispatch::AnyBackend;
pub use error::{BackendError, Result, TokenFetchError};
pub use events::{BackendEvent, EventName};
pub use listener::{EventListener, ListenerHandle, ListenerRegistry};
pub use traits::{Operation, TerminalBackend};
