//! Event relay.
//!
//! [`relay`](Terminal::relay) turns one backend event name into a stream.
//! Each stream registers its own listener on every present backend when it
//! is created and removes them when it is dropped. Whether an event is
//! delivered is decided per event, against the selection at delivery time:
//! events from the backend that is not active are dropped. An event a
//! backend emits just after a switch away from it is therefore lost, even
//! if it was already underway.

use crate::error::{Result, TerminalError};
use crate::selector::BackendSelector;
use crate::terminal::Terminal;
use cardlink_backend::{BackendEvent, EventListener, EventName, ListenerHandle, TerminalBackend};
use cardlink_core::normalize::{
    reader_display_message, reader_input_options, translate_connection_status, update_progress,
};
use cardlink_core::{
    BackendKind, ConnectionStatus, ReaderDisplayMessage, ReaderInputOptions,
    ReaderSoftwareUpdate, UpdateOutcome, object_exists,
};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::trace;

/// Stream of relayed events. Dropping it removes its listeners.
#[derive(Debug)]
pub struct RelayStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
    listeners: Vec<ListenerHandle>,
}

impl<T> RelayStream<T> {
    /// Number of backends this stream listens on.
    pub fn listener_count(&self) -> usize {
        self.listeners.iter().filter(|handle| handle.is_active()).count()
    }
}

impl<T> Stream for RelayStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for RelayStream<T> {
    fn drop(&mut self) {
        for handle in &self.listeners {
            handle.remove();
        }
    }
}

fn relay_listener<T, F>(
    kind: BackendKind,
    name: EventName,
    selector: Arc<BackendSelector>,
    tx: mpsc::UnboundedSender<T>,
    transform: Arc<F>,
) -> EventListener
where
    T: Send + 'static,
    F: Fn(BackendKind, &BackendEvent) -> Option<T> + Send + Sync + 'static,
{
    Arc::new(move |event: &BackendEvent| {
        if !selector.is_active(kind) {
            trace!("Dropping {} from inactive {} backend", name, kind);
            return;
        }
        if let Some(item) = transform(kind, event) {
            // The stream may be gone while its listener is still being removed.
            let _ = tx.send(item);
        }
    })
}

impl<B: TerminalBackend> Terminal<B> {
    /// Relay `name` from the active backend through `transform`. A
    /// transform returning `None` drops the event.
    pub fn relay<T, F>(&self, name: EventName, transform: F) -> Result<RelayStream<T>>
    where
        T: Send + 'static,
        F: Fn(BackendKind, &BackendEvent) -> Option<T> + Send + Sync + 'static,
    {
        self.inner.guard.ensure_initialized()?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(self.relay_into(name, tx, rx, transform))
    }

    fn relay_into<T, F>(
        &self,
        name: EventName,
        tx: mpsc::UnboundedSender<T>,
        rx: mpsc::UnboundedReceiver<T>,
        transform: F,
    ) -> RelayStream<T>
    where
        T: Send + 'static,
        F: Fn(BackendKind, &BackendEvent) -> Option<T> + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        let listeners = self
            .inner
            .backends()
            .map(|(kind, backend)| {
                let listener = relay_listener(
                    kind,
                    name,
                    Arc::clone(&self.inner.selector),
                    tx.clone(),
                    Arc::clone(&transform),
                );
                backend.add_listener(name, listener)
            })
            .collect();

        RelayStream { rx, listeners }
    }

    /// Raw events of one name from the active backend.
    pub fn events(&self, name: EventName) -> Result<RelayStream<BackendEvent>> {
        self.relay(name, |_kind, event| Some(event.clone()))
    }

    /// Connection status changes.
    ///
    /// The current status is fetched from the active backend once and
    /// emitted unless a change event was delivered first. A failed fetch
    /// yields an error on the stream. The fetch runs on the runtime
    /// captured by [`initialize`](Self::initialize), so this may be called
    /// from any thread.
    pub fn connection_status(&self) -> Result<RelayStream<Result<ConnectionStatus>>> {
        self.inner.guard.ensure_initialized()?;
        let runtime = self.inner.runtime()?;

        let seen = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        let delivered = Arc::clone(&seen);
        let stream = self.relay_into(
            EventName::ConnectionStatusChanged,
            tx.clone(),
            rx,
            move |_kind, event| match event {
                BackendEvent::ConnectionStatusChanged(report) => {
                    let status = translate_connection_status(*report)?;
                    delivered.store(true, Ordering::SeqCst);
                    Some(Ok(status))
                }
                _ => None,
            },
        );

        let backend = Arc::clone(self.active_backend());
        runtime.spawn(async move {
            match backend.get_connection_status().await {
                Ok(report) => {
                    if let Some(status) = translate_connection_status(report)
                        && !seen.load(Ordering::SeqCst)
                    {
                        let _ = tx.send(Ok(status));
                    }
                }
                Err(error) => {
                    let _ = tx.send(Err(TerminalError::from(error)));
                }
            }
        });

        Ok(stream)
    }

    /// Input methods the reader is waiting for.
    pub fn did_request_reader_input(&self) -> Result<RelayStream<ReaderInputOptions>> {
        self.relay(EventName::ReaderInputRequested, |_kind, event| match event {
            BackendEvent::ReaderInputRequested { value, android } => {
                reader_input_options(value, *android)
            }
            _ => None,
        })
    }

    /// Messages the reader asks the host to display.
    pub fn did_request_reader_display_message(
        &self,
    ) -> Result<RelayStream<ReaderDisplayMessage>> {
        self.relay(EventName::ReaderDisplayMessageRequested, |_kind, event| {
            match event {
                BackendEvent::ReaderDisplayMessageRequested(value) => {
                    reader_display_message(value)
                }
                _ => None,
            }
        })
    }

    pub fn did_report_available_update(
        &self,
    ) -> Result<RelayStream<Option<ReaderSoftwareUpdate>>> {
        self.relay(EventName::AvailableUpdateReported, |_kind, event| match event {
            BackendEvent::AvailableUpdateReported { update } => {
                Some(object_exists(update.clone()))
            }
            _ => None,
        })
    }

    pub fn did_start_installing_update(
        &self,
    ) -> Result<RelayStream<Option<ReaderSoftwareUpdate>>> {
        self.relay(EventName::InstallingUpdateStarted, |_kind, event| match event {
            BackendEvent::InstallingUpdateStarted { update } => {
                Some(object_exists(update.clone()))
            }
            _ => None,
        })
    }

    /// Update progress, as a fraction.
    pub fn did_report_reader_software_update_progress(&self) -> Result<RelayStream<f32>> {
        self.relay(EventName::SoftwareUpdateProgress, |_kind, event| match event {
            BackendEvent::SoftwareUpdateProgress(value) => update_progress(value),
            _ => None,
        })
    }

    pub fn did_finish_installing_update(&self) -> Result<RelayStream<Option<UpdateOutcome>>> {
        self.relay(EventName::InstallingUpdateFinished, |_kind, event| match event {
            BackendEvent::InstallingUpdateFinished(outcome) => {
                Some(object_exists(Some(outcome.clone())))
            }
            _ => None,
        })
    }
}
