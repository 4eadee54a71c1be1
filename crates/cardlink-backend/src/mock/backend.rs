//! Scriptable backend for testing and development.
//!
//! [`MockBackend`] implements the full backend contract in memory. Its
//! paired [`MockBackendHandle`] emits events, scripts responses and
//! failures, completes discovery and records every call.

use crate::{
    BackendError, BackendEvent, EventListener, EventName, ListenerHandle, ListenerRegistry,
    Operation, Result, TerminalBackend, TokenFetchError,
};
use cardlink_core::{
    Cart, ConnectionStatus, DiscoveryConfiguration, InternetConnectRequest,
    ListLocationsParameters, LocalConnectRequest, LocationList, PaymentIntent, PaymentStatus,
    PermissionState, PermissionStatus, Reader, SimulatorConfiguration, SimulatorReport,
    StatusReport,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};

/// A call received by a [`MockBackend`], with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    SetConnectionToken(std::result::Result<String, TokenFetchError>),
    DiscoverReaders(DiscoveryConfiguration),
    ConnectBluetoothReader(LocalConnectRequest),
    ConnectUsbReader(LocalConnectRequest),
    ConnectInternetReader(InternetConnectRequest),
    RetrievePaymentIntent(String),
    SetReaderDisplay(Cart),
    ListLocations(ListLocationsParameters),
    SetSimulatorConfiguration(SimulatorConfiguration),
    /// Any operation without arguments.
    Plain(Operation),
}

impl BackendCall {
    pub fn operation(&self) -> Operation {
        match self {
            BackendCall::SetConnectionToken(_) => Operation::SetConnectionToken,
            BackendCall::DiscoverReaders(_) => Operation::DiscoverReaders,
            BackendCall::ConnectBluetoothReader(_) => Operation::ConnectBluetoothReader,
            BackendCall::ConnectUsbReader(_) => Operation::ConnectUsbReader,
            BackendCall::ConnectInternetReader(_) => Operation::ConnectInternetReader,
            BackendCall::RetrievePaymentIntent(_) => Operation::RetrievePaymentIntent,
            BackendCall::SetReaderDisplay(_) => Operation::SetReaderDisplay,
            BackendCall::ListLocations(_) => Operation::ListLocations,
            BackendCall::SetSimulatorConfiguration(_) => Operation::SetSimulatorConfiguration,
            BackendCall::Plain(operation) => *operation,
        }
    }
}

#[derive(Debug)]
struct Responses {
    connect: Option<Reader>,
    connected: Option<Reader>,
    status: StatusReport,
    payment_status: Option<PaymentStatus>,
    payment_intent: Option<PaymentIntent>,
    locations: LocationList,
    simulator: SimulatorConfiguration,
    reports_simulated_card: bool,
    permissions: PermissionStatus,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            connect: None,
            connected: None,
            status: StatusReport::canonical(ConnectionStatus::NotConnected),
            payment_status: Some(PaymentStatus::NotReady),
            payment_intent: None,
            locations: LocationList::default(),
            simulator: SimulatorConfiguration::default(),
            reports_simulated_card: true,
            permissions: PermissionStatus {
                location: PermissionState::Granted,
            },
        }
    }
}

#[derive(Debug)]
struct MockState {
    name: String,
    initialized: AtomicBool,
    registry: ListenerRegistry,
    calls: Mutex<Vec<BackendCall>>,
    failures: Mutex<HashMap<Operation, VecDeque<BackendError>>>,
    gates: Mutex<HashMap<Operation, watch::Sender<bool>>>,
    responses: Mutex<Responses>,
    discovery: Mutex<Option<oneshot::Sender<Result<()>>>>,
    token_tx: mpsc::UnboundedSender<std::result::Result<String, TokenFetchError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    /// Record the call, wait on a held gate, then apply a scripted failure.
    async fn enter(&self, call: BackendCall) -> Result<()> {
        let operation = call.operation();
        lock(&self.calls).push(call);

        let gate = lock(&self.gates).get(&operation).map(watch::Sender::subscribe);
        if let Some(mut gate) = gate {
            // A dropped sender means the gate was released.
            let _ = gate.wait_for(|open| *open).await;
        }

        match lock(&self.failures)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn simulator_report(&self) -> SimulatorReport {
        let responses = lock(&self.responses);
        SimulatorReport {
            available_reader_update: responses.simulator.available_reader_update,
            simulated_card: responses
                .simulator
                .simulated_card
                .filter(|_| responses.reports_simulated_card)
                .map(|card| card.name().to_string()),
        }
    }
}

/// In-memory backend.
///
/// # Examples
///
/// ```
/// use cardlink_backend::mock::MockBackend;
/// use cardlink_backend::{BackendEvent, EventName, TerminalBackend};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> cardlink_backend::Result<()> {
///     let (backend, handle) = MockBackend::new();
///     backend.initialize().await?;
///
///     let _listener = backend.add_listener(
///         EventName::RequestConnectionToken,
///         Arc::new(|_event: &BackendEvent| {}),
///     );
///     assert_eq!(handle.emit(BackendEvent::RequestConnectionToken), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    /// Create a mock backend with the default name.
    pub fn new() -> (Self, MockBackendHandle) {
        Self::with_name("Mock Backend")
    }

    /// Create a mock backend with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockBackendHandle) {
        let (token_tx, token_rx) = mpsc::unbounded_channel();
        let state = Arc::new(MockState {
            name: name.into(),
            initialized: AtomicBool::new(false),
            registry: ListenerRegistry::new(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            responses: Mutex::new(Responses::default()),
            discovery: Mutex::new(None),
            token_tx,
        });

        let handle = MockBackendHandle {
            state: Arc::clone(&state),
            tokens: Arc::new(tokio::sync::Mutex::new(token_rx)),
        };

        (Self { state }, handle)
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }
}

impl TerminalBackend for MockBackend {
    async fn set_connection_token(
        &self,
        token: std::result::Result<String, TokenFetchError>,
    ) -> Result<()> {
        self.state
            .enter(BackendCall::SetConnectionToken(token.clone()))
            .await?;
        // The handle may have been dropped; nobody is waiting then.
        let _ = self.state.token_tx.send(token);
        Ok(())
    }

    async fn initialize(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::Initialize))
            .await?;
        self.state.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn discover_readers(&self, config: DiscoveryConfiguration) -> Result<()> {
        self.state
            .enter(BackendCall::DiscoverReaders(config))
            .await?;

        let (done_tx, done_rx) = oneshot::channel();
        *lock(&self.state.discovery) = Some(done_tx);

        match done_rx.await {
            Ok(result) => result,
            Err(_) => Err(BackendError::canceled(Operation::DiscoverReaders.as_str())),
        }
    }

    async fn cancel_discover_readers(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::CancelDiscoverReaders))
            .await?;
        if let Some(done) = lock(&self.state.discovery).take() {
            let _ = done.send(Err(BackendError::canceled(
                Operation::DiscoverReaders.as_str(),
            )));
        }
        Ok(())
    }

    async fn connect_bluetooth_reader(&self, request: LocalConnectRequest) -> Result<Option<Reader>> {
        self.state
            .enter(BackendCall::ConnectBluetoothReader(request))
            .await?;
        Ok(self.connect())
    }

    async fn connect_usb_reader(&self, request: LocalConnectRequest) -> Result<Option<Reader>> {
        self.state.enter(BackendCall::ConnectUsbReader(request)).await?;
        Ok(self.connect())
    }

    async fn connect_internet_reader(
        &self,
        request: InternetConnectRequest,
    ) -> Result<Option<Reader>> {
        self.state
            .enter(BackendCall::ConnectInternetReader(request))
            .await?;
        Ok(self.connect())
    }

    async fn get_connected_reader(&self) -> Result<Option<Reader>> {
        self.state
            .enter(BackendCall::Plain(Operation::GetConnectedReader))
            .await?;
        Ok(lock(&self.state.responses).connected.clone())
    }

    async fn get_connection_status(&self) -> Result<StatusReport> {
        self.state
            .enter(BackendCall::Plain(Operation::GetConnectionStatus))
            .await?;
        Ok(lock(&self.state.responses).status)
    }

    async fn get_payment_status(&self) -> Result<Option<PaymentStatus>> {
        self.state
            .enter(BackendCall::Plain(Operation::GetPaymentStatus))
            .await?;
        Ok(lock(&self.state.responses).payment_status)
    }

    async fn disconnect_reader(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::DisconnectReader))
            .await?;
        lock(&self.state.responses).connected = None;
        Ok(())
    }

    async fn install_available_update(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::InstallAvailableUpdate))
            .await
    }

    async fn cancel_install_update(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::CancelInstallUpdate))
            .await
    }

    async fn retrieve_payment_intent(&self, client_secret: String) -> Result<Option<PaymentIntent>> {
        self.state
            .enter(BackendCall::RetrievePaymentIntent(client_secret))
            .await?;
        Ok(lock(&self.state.responses).payment_intent.clone())
    }

    async fn collect_payment_method(&self) -> Result<Option<PaymentIntent>> {
        self.state
            .enter(BackendCall::Plain(Operation::CollectPaymentMethod))
            .await?;
        Ok(lock(&self.state.responses).payment_intent.clone())
    }

    async fn cancel_collect_payment_method(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::CancelCollectPaymentMethod))
            .await
    }

    async fn process_payment(&self) -> Result<Option<PaymentIntent>> {
        self.state
            .enter(BackendCall::Plain(Operation::ProcessPayment))
            .await?;
        Ok(lock(&self.state.responses).payment_intent.clone())
    }

    async fn clear_cached_credentials(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::ClearCachedCredentials))
            .await
    }

    async fn set_reader_display(&self, cart: Cart) -> Result<()> {
        self.state.enter(BackendCall::SetReaderDisplay(cart)).await
    }

    async fn clear_reader_display(&self) -> Result<()> {
        self.state
            .enter(BackendCall::Plain(Operation::ClearReaderDisplay))
            .await
    }

    async fn list_locations(&self, params: ListLocationsParameters) -> Result<LocationList> {
        self.state.enter(BackendCall::ListLocations(params)).await?;
        Ok(lock(&self.state.responses).locations.clone())
    }

    async fn get_simulator_configuration(&self) -> Result<SimulatorReport> {
        self.state
            .enter(BackendCall::Plain(Operation::GetSimulatorConfiguration))
            .await?;
        Ok(self.state.simulator_report())
    }

    async fn set_simulator_configuration(
        &self,
        config: SimulatorConfiguration,
    ) -> Result<SimulatorReport> {
        self.state
            .enter(BackendCall::SetSimulatorConfiguration(config.clone()))
            .await?;
        {
            let mut responses = lock(&self.state.responses);
            if config.available_reader_update.is_some() {
                responses.simulator.available_reader_update = config.available_reader_update;
            }
            if config.simulated_card.is_some() {
                responses.simulator.simulated_card = config.simulated_card;
            }
        }
        Ok(self.state.simulator_report())
    }

    async fn check_permissions(&self) -> Result<PermissionStatus> {
        self.state
            .enter(BackendCall::Plain(Operation::CheckPermissions))
            .await?;
        Ok(lock(&self.state.responses).permissions)
    }

    async fn request_permissions(&self) -> Result<PermissionStatus> {
        self.state
            .enter(BackendCall::Plain(Operation::RequestPermissions))
            .await?;
        Ok(lock(&self.state.responses).permissions)
    }

    fn add_listener(&self, name: EventName, listener: EventListener) -> ListenerHandle {
        self.state.registry.add(name, listener)
    }
}

impl MockBackend {
    fn connect(&self) -> Option<Reader> {
        let mut responses = lock(&self.state.responses);
        responses.connected = responses.connect.clone();
        responses.connected.clone()
    }
}

/// Handle for controlling a [`MockBackend`].
#[derive(Debug, Clone)]
pub struct MockBackendHandle {
    state: Arc<MockState>,
    tokens: Arc<
        tokio::sync::Mutex<mpsc::UnboundedReceiver<std::result::Result<String, TokenFetchError>>>,
    >,
}

impl MockBackendHandle {
    /// Emit an event to the backend's listeners. Returns how many listeners
    /// received it.
    pub fn emit(&self, event: BackendEvent) -> usize {
        self.state.registry.emit(&event)
    }

    /// Emit a discovery tick.
    pub fn emit_readers(&self, readers: Vec<Reader>) -> usize {
        self.emit(BackendEvent::ReadersDiscovered {
            readers: Some(readers),
        })
    }

    pub fn listener_count(&self, name: EventName) -> usize {
        self.state.registry.listener_count(name)
    }

    pub fn total_listeners(&self) -> usize {
        self.state.registry.total_listeners()
    }

    /// Make the next call of `operation` fail with `error`. Failures queue
    /// up per operation.
    pub fn fail_next(&self, operation: Operation, error: BackendError) {
        lock(&self.state.failures)
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Hold every call of `operation` until [`release`](Self::release).
    pub fn hold(&self, operation: Operation) {
        lock(&self.state.gates)
            .entry(operation)
            .or_insert_with(|| watch::channel(false).0);
    }

    pub fn release(&self, operation: Operation) {
        if let Some(gate) = lock(&self.state.gates).remove(&operation) {
            let _ = gate.send(true);
        }
    }

    /// Finish the discovery call in progress. Returns `false` when none is.
    pub fn complete_discovery(&self, result: Result<()>) -> bool {
        match lock(&self.state.discovery).take() {
            Some(done) => done.send(result).is_ok(),
            None => false,
        }
    }

    pub fn is_discovering(&self) -> bool {
        lock(&self.state.discovery)
            .as_ref()
            .is_some_and(|done| !done.is_closed())
    }

    /// Wait for the next value delivered through `set_connection_token`.
    pub async fn next_token(&self) -> Option<std::result::Result<String, TokenFetchError>> {
        self.tokens.lock().await.recv().await
    }

    pub fn set_connect_response(&self, reader: Option<Reader>) {
        lock(&self.state.responses).connect = reader;
    }

    pub fn set_connected_reader(&self, reader: Option<Reader>) {
        lock(&self.state.responses).connected = reader;
    }

    pub fn set_connection_status(&self, status: StatusReport) {
        lock(&self.state.responses).status = status;
    }

    pub fn set_payment_status(&self, status: Option<PaymentStatus>) {
        lock(&self.state.responses).payment_status = status;
    }

    pub fn set_payment_intent(&self, intent: Option<PaymentIntent>) {
        lock(&self.state.responses).payment_intent = intent;
    }

    pub fn set_locations(&self, locations: LocationList) {
        lock(&self.state.responses).locations = locations;
    }

    pub fn set_permissions(&self, permissions: PermissionStatus) {
        lock(&self.state.responses).permissions = permissions;
    }

    /// Whether simulator reports include the simulated card. Some native
    /// backends cannot read it back.
    pub fn set_reports_simulated_card(&self, reports: bool) {
        lock(&self.state.responses).reports_simulated_card = reports;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.state.calls).clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        lock(&self.state.calls)
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Configurations passed to `discover_readers`, oldest first.
    pub fn discovery_calls(&self) -> Vec<DiscoveryConfiguration> {
        lock(&self.state.calls)
            .iter()
            .filter_map(|call| match call {
                BackendCall::DiscoverReaders(config) => Some(config.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }
}
