//! Listener handles and a reusable per-backend listener registry.
//!
//! A [`ListenerHandle`] is the capability returned by
//! [`TerminalBackend::add_listener`](crate::TerminalBackend::add_listener).
//! Removing it twice, or removing it after the registry is gone, does
//! nothing. Dropping the handle removes the listener as well.
//!
//! # Examples
//!
//! ```
//! use cardlink_backend::{BackendEvent, EventName, ListenerRegistry};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let registry = ListenerRegistry::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! let handle = registry.add(
//!     EventName::RequestConnectionToken,
//!     Arc::new(move |_event: &BackendEvent| {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }),
//! );
//!
//! registry.emit(&BackendEvent::RequestConnectionToken);
//! assert!(handle.remove());
//! assert!(!handle.remove());
//! registry.emit(&BackendEvent::RequestConnectionToken);
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use crate::events::{BackendEvent, EventName};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Callback invoked for every event of the name it was registered for.
///
/// Listeners run synchronously on the emitting task and must not block.
pub type EventListener = Arc<dyn Fn(&BackendEvent) + Send + Sync>;

type Remover = Box<dyn FnOnce() + Send>;

/// Releasable registration of one listener on one backend.
pub struct ListenerHandle {
    name: EventName,
    remover: Mutex<Option<Remover>>,
}

impl ListenerHandle {
    /// Create a handle that runs `remover` the first time it is released.
    pub fn new(name: EventName, remover: impl FnOnce() + Send + 'static) -> Self {
        Self {
            name,
            remover: Mutex::new(Some(Box::new(remover))),
        }
    }

    /// A handle with nothing to release.
    pub fn detached(name: EventName) -> Self {
        Self {
            name,
            remover: Mutex::new(None),
        }
    }

    pub fn event_name(&self) -> EventName {
        self.name
    }

    /// Remove the listener. Returns `false` when it was already removed.
    pub fn remove(&self) -> bool {
        let remover = self
            .remover
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match remover {
            Some(remover) => {
                remover();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.remover
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    listeners: HashMap<EventName, Vec<(u64, EventListener)>>,
}

/// Listener table a backend can embed to implement `add_listener`.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return the handle that removes it.
    pub fn add(&self, name: EventName, listener: EventListener) -> ListenerHandle {
        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.entry(name).or_default().push((id, listener));
            id
        };

        let registry: Weak<Mutex<RegistryState>> = Arc::downgrade(&self.state);
        ListenerHandle::new(name, move || {
            if let Some(state) = registry.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(entries) = state.listeners.get_mut(&name) {
                    entries.retain(|(entry_id, _)| *entry_id != id);
                }
            }
        })
    }

    /// Deliver an event to every listener registered for its name, in
    /// registration order. Listeners run without the registry lock held, so
    /// they may add or remove listeners.
    pub fn emit(&self, event: &BackendEvent) -> usize {
        let listeners: Vec<EventListener> = self
            .lock()
            .listeners
            .get(&event.name())
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self, name: EventName) -> usize {
        self.lock().listeners.get(&name).map_or(0, Vec::len)
    }

    pub fn total_listeners(&self) -> usize {
        self.lock().listeners.values().map(Vec::len).sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.total_listeners())
            .finish()
    }
}
