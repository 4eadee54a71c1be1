//! Connection token bridge.
//!
//! When a backend announces `requestConnectionToken`, the bridge runs the
//! caller's token fetch and answers that backend only. Each backend has at
//! most one exchange in flight: an announcement that arrives while its
//! backend's fetch is pending joins that exchange instead of fetching
//! again, and the settled outcome is delivered once per joined
//! announcement.

use crate::config::ConnectionTokenProvider;
use cardlink_backend::{TerminalBackend, TokenFetchError};
use cardlink_core::BackendKind;
use cardlink_core::constants::TOKEN_FETCH_FAILED_MESSAGE;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::runtime::Handle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct Exchange {
    id: u64,
    waiters: usize,
}

pub struct TokenBridge {
    provider: Arc<dyn ConnectionTokenProvider>,
    exchanges: Mutex<HashMap<BackendKind, Exchange>>,
    next_id: AtomicU64,
}

impl TokenBridge {
    pub fn new(provider: Arc<dyn ConnectionTokenProvider>) -> Self {
        Self {
            provider,
            exchanges: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Handle one announcement from the backend of kind `kind`.
    ///
    /// Runs inside a backend listener, possibly on a backend-owned thread,
    /// so it only books the exchange and spawns the fetch onto `runtime`.
    pub fn request<B: TerminalBackend>(
        self: &Arc<Self>,
        kind: BackendKind,
        backend: Weak<B>,
        runtime: &Handle,
    ) {
        let mut exchanges = self.lock();
        if let Some(exchange) = exchanges.get_mut(&kind) {
            exchange.waiters += 1;
            debug!(
                "Token request from {} joined exchange {} ({} waiting)",
                kind, exchange.id, exchange.waiters
            );
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        exchanges.insert(kind, Exchange { id, waiters: 1 });
        debug!("Starting token exchange {} for {}", id, kind);

        let bridge = Arc::clone(self);
        runtime.spawn(async move { bridge.run(kind, id, backend).await });
    }

    async fn run<B: TerminalBackend>(self: Arc<Self>, kind: BackendKind, id: u64, backend: Weak<B>) {
        let fetched = AssertUnwindSafe(async { self.provider.fetch_connection_token().await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                warn!("Token provider panicked during exchange {} for {}", id, kind);
                Err(TokenFetchError::new(TOKEN_FETCH_FAILED_MESSAGE))
            });
        let outcome = settle(fetched);
        if let Err(error) = &outcome {
            warn!("Token exchange {} for {} failed: {}", id, kind, error);
        }

        let waiters = self
            .lock()
            .remove(&kind)
            .map_or(0, |exchange| exchange.waiters);

        let Some(backend) = backend.upgrade() else {
            debug!("Backend {} dropped before token exchange {} settled", kind, id);
            return;
        };

        for _ in 0..waiters {
            if let Err(error) = backend.set_connection_token(outcome.clone()).await {
                warn!("Failed to deliver token exchange {} to {}: {}", id, kind, error);
            }
        }
        debug!("Token exchange {} for {} answered {} request(s)", id, kind, waiters);
    }

    /// Whether an exchange for `kind` is in flight.
    #[cfg(test)]
    pub fn is_pending(&self, kind: BackendKind) -> bool {
        self.lock().contains_key(&kind)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BackendKind, Exchange>> {
        self.exchanges.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An empty token is a failure, and a failure without a message gets the
/// generic one.
fn settle(fetched: Result<String, TokenFetchError>) -> Result<String, TokenFetchError> {
    match fetched {
        Ok(token) if token.is_empty() => Err(TokenFetchError::missing_token()),
        Ok(token) => Ok(token),
        Err(error) if error.message().is_empty() => {
            Err(TokenFetchError::new(TOKEN_FETCH_FAILED_MESSAGE))
        }
        Err(error) => Err(error),
    }
}
