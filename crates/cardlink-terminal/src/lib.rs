//! Card reader orchestration over a native and a browser backend.
//!
//! A [`Terminal`] fronts two interchangeable backends: a native one that
//! talks to Bluetooth and USB readers through an in-process SDK, and an
//! optional browser one that reaches internet readers. It decides which
//! backend services each call, bridges connection-token requests to the
//! caller, merges discovery results from both backends, and relays backend
//! events as typed streams.
//!
//! # Backend selection
//!
//! - Discovery with [`DiscoveryMethod::Internet`](cardlink_core::DiscoveryMethod)
//!   selects the browser backend; every other method selects native.
//! - Bluetooth and USB connects pin native, internet connects pin browser.
//! - Everything else goes to whichever backend was selected last.
//! - The browser backend is only ever used on iOS and Android hosts.
//!
//! # Example
//!
//! ```no_run
//! use cardlink_backend::mock::MockBackend;
//! use cardlink_core::{BluetoothConnectionConfiguration, DiscoveryConfiguration, DiscoveryMethod, HostPlatform};
//! use cardlink_terminal::{Terminal, TerminalBackends, TerminalConfig};
//! use futures::StreamExt;
//!
//! # async fn example() -> cardlink_terminal::Result<()> {
//! let (native, _) = MockBackend::new();
//! let config = TerminalConfig::new(
//!     HostPlatform::Ios,
//!     || async { Ok("pst_test_secret".to_string()) },
//!     |reader| eprintln!("reader lost: {:?}", reader),
//! );
//! let terminal = Terminal::create(config, TerminalBackends::native_only(native)).await?;
//!
//! let mut discovery =
//!     terminal.discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))?;
//! if let Some(readers) = discovery.next().await {
//!     if let Some(reader) = readers?.first() {
//!         terminal
//!             .connect_bluetooth_reader(
//!                 reader,
//!                 BluetoothConnectionConfiguration { location_id: "tml_1".into() },
//!             )
//!             .await?;
//!     }
//! }
//! discovery.cancel().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing`: selection changes, token exchanges and
//! discovery sessions at `debug`, lifecycle transitions at `info`, and
//! swallowed backend failures at `warn`.

pub mod config;
pub mod discovery;
pub mod error;
mod lifecycle;
pub mod relay;
pub mod selector;
pub mod terminal;
mod token;

pub use config::{ConnectionTokenProvider, DisconnectCallback, TerminalBackends, TerminalConfig};
pub use discovery::DiscoveryStream;
pub use error::{Result, TerminalError};
pub use relay::RelayStream;
pub use selector::BackendSelector;
pub use terminal::Terminal;
