//! The terminal facade.
//!
//! [`Terminal`] owns both backends and every piece of orchestration state
//! for one instance: the backend selection, the initialization flag and
//! tracked listeners, token exchanges, the discovery session, and the last
//! simulated card the caller configured. Clones share that state.
//!
//! Discovery lives in [`discovery`](crate::discovery) and the observation
//! streams in [`relay`](crate::relay); both extend `Terminal` with further
//! `impl` blocks.

use crate::config::{TerminalBackends, TerminalConfig};
use crate::discovery::DiscoveryMerger;
use crate::error::{Result, TerminalError};
use crate::lifecycle::{LifecycleGuard, ListenerKey};
use crate::selector::BackendSelector;
use crate::token::TokenBridge;
use cardlink_backend::{BackendEvent, EventListener, EventName, ListenerHandle, TerminalBackend};
use cardlink_core::normalize::{normalize_reader, simulator_configuration, translate_connection_status};
use cardlink_core::{
    BackendKind, BluetoothConnectionConfiguration, Cart, ConnectionStatus, DeviceStyle,
    DeviceType, HostPlatform, InternetConnectRequest, InternetConnectionConfiguration,
    ListLocationsParameters, LocalConnectRequest, LocationList, PaymentIntent, PaymentStatus,
    PermissionStatus, Presence, Reader, SimulatedCardType, SimulatorConfiguration,
    UsbConnectionConfiguration, device_style_for, object_exists,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub(crate) struct Inner<B> {
    pub(crate) config: TerminalConfig,
    pub(crate) native: Arc<B>,
    pub(crate) browser: Option<Arc<B>>,
    pub(crate) selector: Arc<BackendSelector>,
    pub(crate) guard: LifecycleGuard,
    pub(crate) tokens: Arc<TokenBridge>,
    pub(crate) discovery: DiscoveryMerger,
    pub(crate) simulated_card: Mutex<Option<SimulatedCardType>>,
    /// Runtime captured by `initialize`. Backends may emit from their own
    /// threads, so everything the terminal spawns goes through it.
    runtime: Mutex<Option<Handle>>,
}

/// One orchestration instance over a native and an optional browser
/// backend.
///
/// # Example
///
/// ```no_run
/// use cardlink_backend::mock::MockBackend;
/// use cardlink_core::{DiscoveryConfiguration, DiscoveryMethod, HostPlatform};
/// use cardlink_terminal::{Terminal, TerminalBackends, TerminalConfig};
/// use futures::StreamExt;
///
/// # async fn example() -> cardlink_terminal::Result<()> {
/// let (native, _native_handle) = MockBackend::new();
/// let (browser, _browser_handle) = MockBackend::new();
///
/// let config = TerminalConfig::new(
///     HostPlatform::Android,
///     || async { Ok("pst_test_secret".to_string()) },
///     |_reader| {},
/// );
/// let terminal = Terminal::create(config, TerminalBackends::with_browser(native, browser)).await?;
///
/// let mut readers = terminal.discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both))?;
/// while let Some(batch) = readers.next().await {
///     println!("{} reader(s) nearby", batch?.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Terminal<B> {
    pub(crate) inner: Arc<Inner<B>>,
}

impl<B> Clone for Terminal<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: TerminalBackend> Terminal<B> {
    /// Build an uninitialized terminal. Every operation except
    /// [`initialize`](Self::initialize), the permission calls and
    /// [`device_style`](Self::device_style) fails until it is initialized.
    ///
    /// A browser backend supplied for a host that is not a native mobile
    /// host is dropped.
    pub fn new(config: TerminalConfig, backends: TerminalBackends<B>) -> Self {
        let browser = match backends.browser {
            Some(browser) if config.host.is_native_mobile() => Some(Arc::new(browser)),
            Some(_) => {
                debug!("Ignoring browser backend on {:?} host", config.host);
                None
            }
            None => None,
        };

        let selector = BackendSelector::new(config.host, browser.is_some());
        let tokens = TokenBridge::new(Arc::clone(&config.token_provider));

        Self {
            inner: Arc::new(Inner {
                native: Arc::new(backends.native),
                browser,
                selector: Arc::new(selector),
                guard: LifecycleGuard::new(),
                tokens: Arc::new(tokens),
                discovery: DiscoveryMerger::new(),
                simulated_card: Mutex::new(None),
                runtime: Mutex::new(None),
                config,
            }),
        }
    }

    /// Build and initialize a terminal.
    pub async fn create(config: TerminalConfig, backends: TerminalBackends<B>) -> Result<Self> {
        let terminal = Self::new(config, backends);
        terminal.initialize().await?;
        Ok(terminal)
    }

    /// Register the token and disconnect listeners on every backend, then
    /// initialize the backends concurrently.
    ///
    /// On failure the listeners registered so far are released and the
    /// terminal stays uninitialized. Initializing twice is a no-op.
    ///
    /// The Tokio runtime polling this call is remembered: token exchanges,
    /// discovery calls and status fetches are spawned onto it later, even
    /// when a backend emits from a thread of its own.
    pub async fn initialize(&self) -> Result<()> {
        if self.inner.guard.is_initialized() {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| TerminalError::NoRuntime)?;
        *self
            .inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(runtime.clone());

        for (kind, backend) in self.inner.backends() {
            self.register_token_listener(kind, backend, &runtime);
            self.register_disconnect_listener(kind, backend);
        }

        let native = self.inner.native.initialize();
        let initialized = match &self.inner.browser {
            Some(browser) => futures::future::try_join(native, browser.initialize())
                .await
                .map(|_| ()),
            None => native.await,
        };

        if let Err(error) = initialized {
            warn!("Backend initialization failed: {}", error);
            self.inner.guard.release_all();
            return Err(error.into());
        }

        self.inner.guard.mark_initialized();
        info!(
            "Terminal initialized on {:?} ({} listener(s))",
            self.inner.config.host,
            self.inner.guard.tracked_count()
        );
        Ok(())
    }

    /// Cancel discovery, release every tracked listener and return to the
    /// uninitialized state.
    pub async fn teardown(&self) {
        self.cancel_current_discovery().await;
        let released = self.inner.guard.release_all();
        self.inner.guard.mark_uninitialized();
        info!("Terminal torn down, released {} listener(s)", released);
    }

    fn register_token_listener(&self, kind: BackendKind, backend: &Arc<B>, runtime: &Handle) {
        let bridge = Arc::clone(&self.inner.tokens);
        let weak = Arc::downgrade(backend);
        let runtime = runtime.clone();
        let listener: EventListener = Arc::new(move |_event: &BackendEvent| {
            bridge.request(kind, weak.clone(), &runtime);
        });

        let handle = backend.add_listener(EventName::RequestConnectionToken, listener);
        self.inner
            .guard
            .track(ListenerKey::ConnectionToken(kind), handle);
    }

    fn register_disconnect_listener(&self, kind: BackendKind, backend: &Arc<B>) {
        let callback = Arc::clone(&self.inner.config.on_unexpected_reader_disconnect);
        let listener: EventListener = Arc::new(move |event: &BackendEvent| {
            if let BackendEvent::UnexpectedReaderDisconnect { reader } = event {
                debug!("Unexpected reader disconnect reported by {}", kind);
                callback(object_exists(reader.clone().map(normalize_reader)));
            }
        });

        let handle = backend.add_listener(EventName::UnexpectedReaderDisconnect, listener);
        self.inner
            .guard
            .track(ListenerKey::UnexpectedDisconnect(kind), handle);
    }

    pub fn host(&self) -> HostPlatform {
        self.inner.config.host
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.guard.is_initialized()
    }

    /// The backend that services calls right now.
    pub fn active_backend_kind(&self) -> BackendKind {
        self.inner.selector.active()
    }

    pub(crate) fn active_backend(&self) -> &Arc<B> {
        self.inner.backend(self.inner.selector.active())
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Connect to a Bluetooth reader. Pins the native backend.
    pub async fn connect_bluetooth_reader(
        &self,
        reader: &Reader,
        config: BluetoothConnectionConfiguration,
    ) -> Result<Option<Reader>> {
        self.inner.guard.ensure_initialized()?;
        self.inner.selector.select(BackendKind::Native);

        let request = LocalConnectRequest {
            serial_number: reader.serial_number.clone(),
            location_id: config.location_id,
        };
        let connected = self.active_backend().connect_bluetooth_reader(request).await?;
        Ok(object_exists(connected))
    }

    /// Connect to a USB reader. Pins the native backend.
    pub async fn connect_usb_reader(
        &self,
        reader: &Reader,
        config: UsbConnectionConfiguration,
    ) -> Result<Option<Reader>> {
        self.inner.guard.ensure_initialized()?;
        self.inner.selector.select(BackendKind::Native);

        let request = LocalConnectRequest {
            serial_number: reader.serial_number.clone(),
            location_id: config.location_id,
        };
        let connected = self.active_backend().connect_usb_reader(request).await?;
        Ok(object_exists(connected))
    }

    /// Connect to an internet reader. Pins the browser backend.
    pub async fn connect_internet_reader(
        &self,
        reader: &Reader,
        config: Option<InternetConnectionConfiguration>,
    ) -> Result<Option<Reader>> {
        self.inner.guard.ensure_initialized()?;
        self.inner.selector.select(BackendKind::Browser);

        let request = InternetConnectRequest::for_reader(reader, &config.unwrap_or_default());
        let connected = self.active_backend().connect_internet_reader(request).await?;
        Ok(object_exists(connected))
    }

    #[deprecated(note = "use `connect_internet_reader`")]
    pub async fn connect_reader(&self, reader: &Reader) -> Result<Option<Reader>> {
        self.connect_internet_reader(reader, None).await
    }

    pub async fn get_connected_reader(&self) -> Result<Option<Reader>> {
        self.inner.guard.ensure_initialized()?;
        Ok(object_exists(self.active_backend().get_connected_reader().await?))
    }

    /// Current connection status. A code the normalizer does not know
    /// yields `None`.
    pub async fn get_connection_status(&self) -> Result<Option<ConnectionStatus>> {
        self.inner.guard.ensure_initialized()?;
        let report = self.active_backend().get_connection_status().await?;
        Ok(translate_connection_status(report))
    }

    pub async fn get_payment_status(&self) -> Result<Option<PaymentStatus>> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().get_payment_status().await?)
    }

    pub async fn disconnect_reader(&self) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().disconnect_reader().await?)
    }

    // ------------------------------------------------------------------------
    // Software updates
    // ------------------------------------------------------------------------

    pub async fn install_available_update(&self) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().install_available_update().await?)
    }

    pub async fn cancel_install_update(&self) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().cancel_install_update().await?)
    }

    // ------------------------------------------------------------------------
    // Payments
    // ------------------------------------------------------------------------

    pub async fn retrieve_payment_intent(&self, client_secret: &str) -> Result<Option<PaymentIntent>> {
        self.inner.guard.ensure_initialized()?;
        let intent = self
            .active_backend()
            .retrieve_payment_intent(client_secret.to_string())
            .await?;
        Ok(object_exists(intent))
    }

    pub async fn collect_payment_method(&self) -> Result<Option<PaymentIntent>> {
        self.inner.guard.ensure_initialized()?;
        Ok(object_exists(self.active_backend().collect_payment_method().await?))
    }

    pub async fn cancel_collect_payment_method(&self) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().cancel_collect_payment_method().await?)
    }

    pub async fn process_payment(&self) -> Result<Option<PaymentIntent>> {
        self.inner.guard.ensure_initialized()?;
        Ok(object_exists(self.active_backend().process_payment().await?))
    }

    pub async fn clear_cached_credentials(&self) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().clear_cached_credentials().await?)
    }

    // ------------------------------------------------------------------------
    // Reader display
    // ------------------------------------------------------------------------

    pub async fn set_reader_display(&self, cart: Cart) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().set_reader_display(cart).await?)
    }

    pub async fn clear_reader_display(&self) -> Result<()> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().clear_reader_display().await?)
    }

    // ------------------------------------------------------------------------
    // Locations
    // ------------------------------------------------------------------------

    pub async fn list_locations(
        &self,
        params: Option<ListLocationsParameters>,
    ) -> Result<LocationList> {
        self.inner.guard.ensure_initialized()?;
        Ok(self
            .active_backend()
            .list_locations(params.unwrap_or_default())
            .await?)
    }

    // ------------------------------------------------------------------------
    // Simulator
    // ------------------------------------------------------------------------

    /// Read the simulator configuration.
    ///
    /// Backends that cannot read the simulated card back report none; the
    /// card most recently configured through this terminal fills the gap.
    pub async fn get_simulator_configuration(&self) -> Result<Option<SimulatorConfiguration>> {
        self.inner.guard.ensure_initialized()?;
        let report = self.active_backend().get_simulator_configuration().await?;

        let reported_card = report.simulated_card.is_some();
        let mut config = simulator_configuration(report);
        let mut remembered = self
            .inner
            .simulated_card
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if reported_card {
            *remembered = config.simulated_card;
        } else {
            config.simulated_card = *remembered;
        }

        Ok(object_exists(Some(config)))
    }

    /// Configure the simulator and remember the simulated card.
    pub async fn set_simulator_configuration(
        &self,
        config: SimulatorConfiguration,
    ) -> Result<Option<SimulatorConfiguration>> {
        self.inner.guard.ensure_initialized()?;
        let requested_card = config.simulated_card;
        let report = self
            .active_backend()
            .set_simulator_configuration(config)
            .await?;

        if let Some(card) = requested_card {
            *self
                .inner
                .simulated_card
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(card);
        }

        let reported_card = report.simulated_card.is_some();
        let blank = report.is_blank();
        let mut applied = simulator_configuration(report);
        if !reported_card && !blank {
            applied.simulated_card = requested_card;
        }

        Ok(object_exists(Some(applied)))
    }

    // ------------------------------------------------------------------------
    // Pass-throughs without the initialization check
    // ------------------------------------------------------------------------

    pub async fn check_permissions(&self) -> Result<PermissionStatus> {
        Ok(self.inner.native.check_permissions().await?)
    }

    pub async fn request_permissions(&self) -> Result<PermissionStatus> {
        Ok(self.inner.native.request_permissions().await?)
    }

    /// Connectivity class of a device type.
    pub fn device_style(device_type: Option<DeviceType>) -> DeviceStyle {
        device_style_for(device_type)
    }

    /// Register a listener directly on the active backend, without
    /// selection filtering or translation.
    #[deprecated(note = "use the typed observation streams or `events`")]
    pub fn add_listener(&self, name: EventName, listener: EventListener) -> Result<ListenerHandle> {
        self.inner.guard.ensure_initialized()?;
        Ok(self.active_backend().add_listener(name, listener))
    }
}

impl<B> Inner<B> {
    /// The runtime captured by the last successful `initialize`.
    pub(crate) fn runtime(&self) -> Result<Handle> {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TerminalError::Uninitialized)
    }

    pub(crate) fn backend(&self, kind: BackendKind) -> &Arc<B> {
        match (kind, &self.browser) {
            (BackendKind::Browser, Some(browser)) => browser,
            _ => &self.native,
        }
    }

    pub(crate) fn backends(&self) -> impl Iterator<Item = (BackendKind, &Arc<B>)> {
        std::iter::once((BackendKind::Native, &self.native))
            .chain(self.browser.iter().map(|browser| (BackendKind::Browser, browser)))
    }
}
