//! Initialization flag and the tracked listener map.

use crate::error::{Result, TerminalError};
use cardlink_backend::ListenerHandle;
use cardlink_core::BackendKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Listener slots owned by the terminal, one per backend and purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKey {
    ConnectionToken(BackendKind),
    UnexpectedDisconnect(BackendKind),
}

#[derive(Debug, Default)]
pub struct LifecycleGuard {
    initialized: AtomicBool,
    listeners: Mutex<HashMap<ListenerKey, ListenerHandle>>,
}

impl LifecycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`TerminalError::Uninitialized`] until
    /// [`mark_initialized`](Self::mark_initialized) ran.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(TerminalError::Uninitialized)
        }
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn mark_uninitialized(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Track a handle under `key`. A handle already tracked there is
    /// released.
    pub fn track(&self, key: ListenerKey, handle: ListenerHandle) {
        let previous = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handle);
        if let Some(previous) = previous {
            previous.remove();
        }
    }

    /// Release the handle under `key`. Returns `false` when none was tracked.
    #[cfg(test)]
    pub fn release(&self, key: ListenerKey) -> bool {
        let handle = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        handle.is_some_and(|handle| handle.remove())
    }

    pub fn release_all(&self) -> usize {
        let handles: Vec<ListenerHandle> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        handles.iter().filter(|handle| handle.remove()).count()
    }

    pub fn tracked_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_backend::EventName;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn counted_handle(removed: &Arc<AtomicUsize>) -> ListenerHandle {
        let removed = Arc::clone(removed);
        ListenerHandle::new(EventName::ReadersDiscovered, move || {
            removed.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_uninitialized_until_marked() {
        let guard = LifecycleGuard::new();
        assert_eq!(guard.ensure_initialized(), Err(TerminalError::Uninitialized));

        guard.mark_initialized();
        assert_eq!(guard.ensure_initialized(), Ok(()));

        guard.mark_uninitialized();
        assert!(guard.ensure_initialized().is_err());
    }

    #[test]
    fn test_release_is_idempotent() {
        let guard = LifecycleGuard::new();
        let removed = Arc::new(AtomicUsize::new(0));
        let key = ListenerKey::UnexpectedDisconnect(BackendKind::Native);

        guard.track(key, counted_handle(&removed));
        assert!(guard.release(key));
        assert!(!guard.release(key));
        assert_eq!(removed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_track_replaces_and_releases_previous() {
        let guard = LifecycleGuard::new();
        let removed = Arc::new(AtomicUsize::new(0));
        let key = ListenerKey::ConnectionToken(BackendKind::Browser);

        guard.track(key, counted_handle(&removed));
        guard.track(key, counted_handle(&removed));

        assert_eq!(removed.load(Ordering::SeqCst), 1);
        assert_eq!(guard.tracked_count(), 1);
    }

    #[test]
    fn test_release_all() {
        let guard = LifecycleGuard::new();
        let removed = Arc::new(AtomicUsize::new(0));

        guard.track(
            ListenerKey::ConnectionToken(BackendKind::Native),
            counted_handle(&removed),
        );
        guard.track(
            ListenerKey::UnexpectedDisconnect(BackendKind::Native),
            counted_handle(&removed),
        );

        assert_eq!(guard.release_all(), 2);
        assert_eq!(guard.tracked_count(), 0);
        assert_eq!(removed.load(Ordering::SeqCst), 2);
    }
}
