//! Shared fixtures for the terminal integration tests.
//!
//! [`Fixture`] builds a terminal over two mock backends and keeps their
//! handles, plus the values the caller-side callbacks have seen.

#![allow(dead_code)]

use cardlink_backend::TokenFetchError;
use cardlink_backend::mock::{MockBackend, MockBackendHandle};
use cardlink_core::{HostPlatform, Reader};
use cardlink_terminal::{Terminal, TerminalBackends, TerminalConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output to the test writer. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct Fixture {
    pub terminal: Terminal<MockBackend>,
    pub native: MockBackendHandle,
    pub browser: MockBackendHandle,
    pub token_fetches: Arc<AtomicUsize>,
    pub disconnects: Arc<Mutex<Vec<Option<Reader>>>>,
}

impl Fixture {
    /// Uninitialized terminal on `host` with both backends, fetching
    /// `token` on every request.
    pub fn with_token(host: HostPlatform, token: Result<&str, &str>) -> Self {
        init_tracing();

        let (native, native_handle) = MockBackend::with_name("native");
        let (browser, browser_handle) = MockBackend::with_name("browser");

        let token_fetches = Arc::new(AtomicUsize::new(0));
        let disconnects = Arc::new(Mutex::new(Vec::new()));

        let fetches = Arc::clone(&token_fetches);
        let token = token.map(str::to_string).map_err(str::to_string);
        let seen = Arc::clone(&disconnects);
        let config = TerminalConfig::new(
            host,
            move || {
                fetches.fetch_add(1, Ordering::SeqCst);
                let token = token.clone();
                async move { token.map_err(TokenFetchError::new) }
            },
            move |reader| seen.lock().unwrap().push(reader),
        );

        Self {
            terminal: Terminal::new(config, TerminalBackends::with_browser(native, browser)),
            native: native_handle,
            browser: browser_handle,
            token_fetches,
            disconnects,
        }
    }

    pub fn new(host: HostPlatform) -> Self {
        Self::with_token(host, Ok("pst_test_secret"))
    }

    /// Initialized Android terminal with both backends.
    pub async fn initialized() -> Self {
        let fixture = Self::new(HostPlatform::Android);
        fixture.terminal.initialize().await.unwrap();
        fixture
    }

    pub fn disconnects(&self) -> Vec<Option<Reader>> {
        self.disconnects.lock().unwrap().clone()
    }
}

/// Poll `condition` until it holds, failing the test after a second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not met within 1s");
}

pub fn reader(serial: &str) -> Reader {
    Reader::with_serial(serial)
}
