//! Backend selection.
//!
//! Selection is sticky per call family: discovery setup picks a backend
//! from the discovery method, Bluetooth/USB connects pin native and
//! internet connects pin browser. The browser backend is only ever
//! *active* when it was selected, exists, and the host is a native mobile
//! host. Otherwise the native backend (on a browser host, the only
//! backend) services everything.

use cardlink_core::{BackendKind, DiscoveryMethod, HostPlatform};
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

const NATIVE: u8 = 0;
const BROWSER: u8 = 1;

fn encode(kind: BackendKind) -> u8 {
    match kind {
        BackendKind::Native => NATIVE,
        BackendKind::Browser => BROWSER,
    }
}

#[derive(Debug)]
pub struct BackendSelector {
    selected: AtomicU8,
    browser_available: bool,
}

impl BackendSelector {
    /// Selector for a host with the given backends present.
    pub fn new(host: HostPlatform, has_browser: bool) -> Self {
        Self {
            selected: AtomicU8::new(NATIVE),
            browser_available: has_browser && host.is_native_mobile(),
        }
    }

    /// Whether the browser backend can ever become active.
    pub fn browser_available(&self) -> bool {
        self.browser_available
    }

    pub fn select(&self, kind: BackendKind) {
        let previous = self.selected.swap(encode(kind), Ordering::SeqCst);
        if previous != encode(kind) {
            debug!("Backend selection changed to {}", kind);
        }
    }

    /// Selection before a discovery call: browser for internet discovery,
    /// native for everything else.
    pub fn select_for_discovery(&self, method: DiscoveryMethod) {
        let kind = match method {
            DiscoveryMethod::Internet => BackendKind::Browser,
            _ => BackendKind::Native,
        };
        self.select(kind);
    }

    /// The backend that was selected, whether or not it is available.
    pub fn selected(&self) -> BackendKind {
        match self.selected.load(Ordering::SeqCst) {
            BROWSER => BackendKind::Browser,
            _ => BackendKind::Native,
        }
    }

    /// The backend that services calls right now.
    pub fn active(&self) -> BackendKind {
        match self.selected() {
            BackendKind::Browser if self.browser_available => BackendKind::Browser,
            _ => BackendKind::Native,
        }
    }

    pub fn is_active(&self, kind: BackendKind) -> bool {
        self.active() == kind
    }
}
