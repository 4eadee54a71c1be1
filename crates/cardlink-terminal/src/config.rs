//! Terminal configuration.
//!
//! A [`TerminalConfig`] carries what the caller must supply at creation:
//! the host platform, the connection-token callback and the
//! unexpected-disconnect callback. [`TerminalBackends`] carries the
//! backends the host actually instantiated.

use cardlink_backend::TokenFetchError;
use cardlink_core::{HostPlatform, Reader};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Source of connection tokens.
///
/// Implemented for every `Fn() -> impl Future<Output = Result<String,
/// TokenFetchError>>` closure, which is what callers usually pass.
pub trait ConnectionTokenProvider: Send + Sync + 'static {
    fn fetch_connection_token(&self) -> BoxFuture<'static, Result<String, TokenFetchError>>;
}

impl<F, Fut> ConnectionTokenProvider for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, TokenFetchError>> + Send + 'static,
{
    fn fetch_connection_token(&self) -> BoxFuture<'static, Result<String, TokenFetchError>> {
        Box::pin(self())
    }
}

/// Callback for readers that disconnect without being asked to.
pub type DisconnectCallback = Arc<dyn Fn(Option<Reader>) + Send + Sync>;

/// Configuration for a [`Terminal`](crate::Terminal).
///
/// # Example
///
/// ```
/// use cardlink_core::HostPlatform;
/// use cardlink_terminal::TerminalConfig;
///
/// let config = TerminalConfig::new(
///     HostPlatform::Android,
///     || async { Ok("pst_test_secret".to_string()) },
///     |reader| println!("lost reader {:?}", reader),
/// );
/// assert_eq!(config.host, HostPlatform::Android);
/// ```
#[derive(Clone)]
pub struct TerminalConfig {
    /// Platform the terminal runs on
    pub host: HostPlatform,

    pub(crate) token_provider: Arc<dyn ConnectionTokenProvider>,

    pub(crate) on_unexpected_reader_disconnect: DisconnectCallback,
}

impl TerminalConfig {
    pub fn new<F, Fut, D>(host: HostPlatform, fetch_connection_token: F, on_disconnect: D) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, TokenFetchError>> + Send + 'static,
        D: Fn(Option<Reader>) + Send + Sync + 'static,
    {
        Self::with_provider(host, fetch_connection_token, on_disconnect)
    }

    /// Like [`new`](Self::new), for token sources that are not closures.
    pub fn with_provider<P, D>(host: HostPlatform, provider: P, on_disconnect: D) -> Self
    where
        P: ConnectionTokenProvider,
        D: Fn(Option<Reader>) + Send + Sync + 'static,
    {
        Self {
            host,
            token_provider: Arc::new(provider),
            on_unexpected_reader_disconnect: Arc::new(on_disconnect),
        }
    }
}

impl fmt::Debug for TerminalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalConfig")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Backends available to a terminal.
///
/// `native` is always present; on a browser host it is simply the only
/// backend. `browser` is only used on native mobile hosts.
#[derive(Debug, Clone)]
pub struct TerminalBackends<B> {
    pub native: B,
    pub browser: Option<B>,
}

impl<B> TerminalBackends<B> {
    pub fn native_only(native: B) -> Self {
        Self {
            native,
            browser: None,
        }
    }

    pub fn with_browser(native: B, browser: B) -> Self {
        Self {
            native,
            browser: Some(browser),
        }
    }
}
