//! Discovery stream merger.
//!
//! A discovery session runs the active backend's discovery (the primary)
//! and, for [`DiscoveryMethod::Both`], the browser backend's internet
//! discovery next to it (the secondary). Each side keeps its latest reader
//! list; every update from either side emits primary followed by
//! secondary. The stream ends when the primary call succeeds and fails
//! when it fails. The secondary's outcome is only logged.
//!
//! Sessions are numbered and own their `readersDiscovered` listeners.
//! Starting discovery supersedes the previous session, and a stream only
//! ever ends its own session, so ending one never touches another's
//! listeners.

use crate::error::{Result, TerminalError};
use crate::terminal::Terminal;
use cardlink_backend::{
    BackendError, BackendEvent, EventListener, EventName, ListenerHandle, TerminalBackend,
};
use cardlink_core::normalize::normalize_readers;
use cardlink_core::{BackendKind, DiscoveryConfiguration, DiscoveryMethod, Reader};
use futures::Stream;
use futures::future::BoxFuture;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug)]
struct Session {
    id: u64,
    listeners: Vec<ListenerHandle>,
}

impl Session {
    fn release(self) -> usize {
        self.listeners.iter().filter(|handle| handle.remove()).count()
    }
}

/// Session bookkeeping. A session is present exactly while its primary
/// discovery call is outstanding.
#[derive(Debug, Default)]
pub(crate) struct DiscoveryMerger {
    current: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

impl DiscoveryMerger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start a session, superseding any current one. The superseded
    /// session's listeners are released.
    fn begin(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Session {
            id,
            listeners: Vec::new(),
        };
        let previous = self.lock().replace(session);
        if let Some(previous) = previous {
            debug!("Discovery session {} supersedes session {}", id, previous.id);
            previous.release();
        }
        id
    }

    /// Hand a listener to session `id`. If that session is no longer
    /// current the listener is removed at once.
    fn attach(&self, id: u64, handle: ListenerHandle) {
        let mut current = self.lock();
        match current.as_mut() {
            Some(session) if session.id == id => session.listeners.push(handle),
            _ => {
                drop(current);
                handle.remove();
            }
        }
    }

    /// End session `id`, or whatever session is current for `None`,
    /// releasing its listeners. Returns whether a session was ended.
    fn end(&self, id: Option<u64>) -> bool {
        let ended = {
            let mut current = self.lock();
            match (current.as_ref().map(|session| session.id), id) {
                (Some(active), Some(id)) if active == id => current.take(),
                (Some(_), None) => current.take(),
                _ => None,
            }
        };
        ended.map(Session::release).is_some()
    }

    pub(crate) fn current(&self) -> Option<u64> {
        self.lock().as_ref().map(|session| session.id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
enum Update {
    Readers(Vec<Reader>),
    Completed,
    Failed(BackendError),
}

#[derive(Debug, Default)]
struct MergedLists {
    primary: Vec<Reader>,
    secondary: Vec<Reader>,
}

type Canceller = Box<dyn FnOnce() -> Option<BoxFuture<'static, ()>> + Send>;

/// Reader lists from one discovery session.
///
/// Dropping the stream before it ends cancels the session. Prefer
/// [`cancel`](Self::cancel) to wait for the backends to acknowledge.
pub struct DiscoveryStream {
    session: u64,
    runtime: Handle,
    rx: mpsc::UnboundedReceiver<Update>,
    canceller: Option<Canceller>,
    finished: bool,
}

impl DiscoveryStream {
    pub fn session_id(&self) -> u64 {
        self.session
    }

    /// Cancel the session and wait for the backends' cancel calls. Errors
    /// from those calls are logged, never returned.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.canceller.take()
            && let Some(cancel_backends) = cancel()
        {
            cancel_backends.await;
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.canceller = None;
    }
}

impl Stream for DiscoveryStream {
    type Item = Result<Vec<Reader>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Update::Readers(readers))) => Poll::Ready(Some(Ok(readers))),
            Poll::Ready(Some(Update::Completed)) | Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Update::Failed(error))) => {
                this.finish();
                Poll::Ready(Some(Err(TerminalError::Discovery(error))))
            }
        }
    }
}

impl Drop for DiscoveryStream {
    fn drop(&mut self) {
        let Some(cancel) = self.canceller.take() else {
            return;
        };
        if let Some(cancel_backends) = cancel() {
            self.runtime.spawn(cancel_backends);
        }
    }
}

impl fmt::Debug for DiscoveryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryStream")
            .field("session", &self.session)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

fn readers_listener(
    lists: Arc<Mutex<MergedLists>>,
    tx: mpsc::UnboundedSender<Update>,
    secondary: bool,
) -> EventListener {
    Arc::new(move |event: &BackendEvent| {
        let BackendEvent::ReadersDiscovered { readers } = event else {
            return;
        };
        let readers = normalize_readers(readers.clone());

        let mut lists = lists.lock().unwrap_or_else(PoisonError::into_inner);
        if secondary {
            lists.secondary = readers;
        } else {
            lists.primary = readers;
        }
        let merged = lists
            .primary
            .iter()
            .chain(lists.secondary.iter())
            .cloned()
            .collect();
        let _ = tx.send(Update::Readers(merged));
    })
}

/// Options for the primary call: `Both` scans Bluetooth, and only internet
/// discovery keeps the location filter.
fn primary_options(config: &DiscoveryConfiguration) -> DiscoveryConfiguration {
    let mut options = config.clone();
    if options.discovery_method == DiscoveryMethod::Both {
        options.discovery_method = DiscoveryMethod::BluetoothScan;
    }
    if options.discovery_method != DiscoveryMethod::Internet {
        options.location_id = None;
    }
    options
}

impl<B: TerminalBackend> Terminal<B> {
    /// Discover readers.
    ///
    /// The discovery calls run as tasks on the runtime captured by
    /// [`initialize`](Self::initialize), so this may be called from any
    /// thread.
    pub fn discover_readers(&self, config: DiscoveryConfiguration) -> Result<DiscoveryStream> {
        self.inner.guard.ensure_initialized()?;
        let runtime = self.inner.runtime()?;

        self.inner
            .selector
            .select_for_discovery(config.discovery_method);
        let primary_kind = self.inner.selector.active();
        let primary = Arc::clone(self.inner.backend(primary_kind));
        let secondary = match (config.discovery_method, &self.inner.browser) {
            (DiscoveryMethod::Both, Some(browser)) if primary_kind == BackendKind::Native => {
                Some(Arc::clone(browser))
            }
            _ => None,
        };

        let session = self.inner.discovery.begin();
        debug!(
            "Discovery session {} started on {} ({:?})",
            session, primary_kind, config.discovery_method
        );

        let lists = Arc::new(Mutex::new(MergedLists::default()));
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = primary.add_listener(
            EventName::ReadersDiscovered,
            readers_listener(Arc::clone(&lists), tx.clone(), false),
        );
        self.inner.discovery.attach(session, handle);

        let options = primary_options(&config);
        let weak = Arc::downgrade(&self.inner);
        let done = tx.clone();
        runtime.spawn(async move {
            let outcome = primary.discover_readers(options).await;
            if let Some(inner) = weak.upgrade()
                && inner.discovery.end(Some(session))
            {
                debug!("Discovery session {} finished", session);
            }
            let update = match outcome {
                Ok(()) => Update::Completed,
                Err(error) => Update::Failed(error),
            };
            let _ = done.send(update);
        });

        if let Some(secondary) = secondary {
            let handle = secondary.add_listener(
                EventName::ReadersDiscovered,
                readers_listener(lists, tx, true),
            );
            self.inner.discovery.attach(session, handle);

            let options = DiscoveryConfiguration {
                discovery_method: DiscoveryMethod::Internet,
                ..config
            };
            runtime.spawn(async move {
                match secondary.discover_readers(options).await {
                    Ok(()) => debug!("Secondary discovery for session {} finished", session),
                    Err(error) => {
                        debug!("Secondary discovery for session {} failed: {}", session, error)
                    }
                }
            });
        }

        let weak = Arc::downgrade(&self.inner);
        let canceller: Canceller = Box::new(move || {
            let inner = weak.upgrade()?;
            Terminal { inner }.end_session(Some(session))
        });

        Ok(DiscoveryStream {
            session,
            runtime,
            rx,
            canceller: Some(canceller),
            finished: false,
        })
    }

    /// Whether a discovery session is waiting on its primary call.
    pub fn is_discovering(&self) -> bool {
        self.inner.discovery.current().is_some()
    }

    /// Cancel the current discovery session, if any. Cancellation errors
    /// from the backends are logged and swallowed.
    pub async fn cancel_discover_readers(&self) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        self.cancel_current_discovery().await;
        Ok(())
    }

    pub(crate) async fn cancel_current_discovery(&self) {
        if let Some(cancel_backends) = self.end_session(None) {
            cancel_backends.await;
        }
    }

    /// End a session and release its listeners. Returns the backend cancel
    /// calls to run when the session's primary call was still outstanding.
    fn end_session(&self, session: Option<u64>) -> Option<BoxFuture<'static, ()>> {
        if !self.inner.discovery.end(session) {
            return None;
        }
        debug!("Discovery session {:?} canceled", session);

        let backends: Vec<(BackendKind, Arc<B>)> = self
            .inner
            .backends()
            .map(|(kind, backend)| (kind, Arc::clone(backend)))
            .collect();

        Some(Box::pin(async move {
            let cancels = backends.iter().map(|(kind, backend)| async move {
                if let Err(error) = backend.cancel_discover_readers().await {
                    warn!("Ignoring discovery cancel failure from {}: {}", kind, error);
                }
            });
            futures::future::join_all(cancels).await;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::AtomicUsize;

    #[rstest]
    #[case(DiscoveryMethod::Both, DiscoveryMethod::BluetoothScan, None)]
    #[case(DiscoveryMethod::BluetoothScan, DiscoveryMethod::BluetoothScan, None)]
    #[case(DiscoveryMethod::UsbScan, DiscoveryMethod::UsbScan, None)]
    #[case(DiscoveryMethod::Internet, DiscoveryMethod::Internet, Some("tml_1"))]
    fn test_primary_options(
        #[case] requested: DiscoveryMethod,
        #[case] expected: DiscoveryMethod,
        #[case] location: Option<&str>,
    ) {
        let config = DiscoveryConfiguration::new(requested).with_location_id("tml_1");
        let options = primary_options(&config);

        assert_eq!(options.discovery_method, expected);
        assert_eq!(options.location_id.as_deref(), location);
    }

    #[test]
    fn test_sessions_supersede() {
        let merger = DiscoveryMerger::new();
        let first = merger.begin();
        let second = merger.begin();

        assert!(second > first);
        assert!(!merger.end(Some(first)));
        assert_eq!(merger.current(), Some(second));
        assert!(merger.end(Some(second)));
        assert!(!merger.end(None));
    }

    fn counted_handle(removed: &Arc<AtomicUsize>) -> ListenerHandle {
        let removed = Arc::clone(removed);
        ListenerHandle::new(EventName::ReadersDiscovered, move || {
            removed.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_ending_stale_session_keeps_current_listeners() {
        let merger = DiscoveryMerger::new();
        let stale_removed = Arc::new(AtomicUsize::new(0));
        let current_removed = Arc::new(AtomicUsize::new(0));

        let stale = merger.begin();
        merger.attach(stale, counted_handle(&stale_removed));

        // A new session starts while the stale one's primary call settles.
        let current = merger.begin();
        assert_eq!(stale_removed.load(Ordering::SeqCst), 1);
        merger.attach(current, counted_handle(&current_removed));

        assert!(!merger.end(Some(stale)));
        assert_eq!(current_removed.load(Ordering::SeqCst), 0);
        assert_eq!(merger.current(), Some(current));

        // A listener registered for the stale session after it lost the
        // slot is dropped on the spot.
        merger.attach(stale, counted_handle(&stale_removed));
        assert_eq!(stale_removed.load(Ordering::SeqCst), 2);
        assert_eq!(current_removed.load(Ordering::SeqCst), 0);

        assert!(merger.end(None));
        assert_eq!(current_removed.load(Ordering::SeqCst), 1);
    }
}
