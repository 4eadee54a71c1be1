//! The backend contract.
//!
//! A backend is an opaque capability provider: it talks to readers however
//! it likes and exposes the operations below plus an event subscription
//! primitive. Async methods return `impl Future + Send` (native async traits,
//! Edition 2024), so the orchestration layer can run them on spawned tasks.
//! Implementors may write them as plain `async fn`.
//!
//! The trait is not object safe. Combine backends of different concrete
//! types through [`AnyBackend`](crate::dispatch::AnyBackend).

use crate::error::{Result, TokenFetchError};
use crate::events::EventName;
use crate::listener::{EventListener, ListenerHandle};
use cardlink_core::{
    Cart, DiscoveryConfiguration, InternetConnectRequest, ListLocationsParameters,
    LocalConnectRequest, LocationList, PaymentIntent, PaymentStatus, PermissionStatus, Reader,
    SimulatorConfiguration, SimulatorReport, StatusReport,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Every backend operation, named as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    SetConnectionToken,
    Initialize,
    DiscoverReaders,
    CancelDiscoverReaders,
    ConnectBluetoothReader,
    ConnectUsbReader,
    ConnectInternetReader,
    GetConnectedReader,
    GetConnectionStatus,
    GetPaymentStatus,
    DisconnectReader,
    InstallAvailableUpdate,
    CancelInstallUpdate,
    RetrievePaymentIntent,
    CollectPaymentMethod,
    CancelCollectPaymentMethod,
    ProcessPayment,
    ClearCachedCredentials,
    SetReaderDisplay,
    ClearReaderDisplay,
    ListLocations,
    GetSimulatorConfiguration,
    SetSimulatorConfiguration,
    CheckPermissions,
    RequestPermissions,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SetConnectionToken => "setConnectionToken",
            Operation::Initialize => "initialize",
            Operation::DiscoverReaders => "discoverReaders",
            Operation::CancelDiscoverReaders => "cancelDiscoverReaders",
            Operation::ConnectBluetoothReader => "connectBluetoothReader",
            Operation::ConnectUsbReader => "connectUsbReader",
            Operation::ConnectInternetReader => "connectInternetReader",
            Operation::GetConnectedReader => "getConnectedReader",
            Operation::GetConnectionStatus => "getConnectionStatus",
            Operation::GetPaymentStatus => "getPaymentStatus",
            Operation::DisconnectReader => "disconnectReader",
            Operation::InstallAvailableUpdate => "installAvailableUpdate",
            Operation::CancelInstallUpdate => "cancelInstallUpdate",
            Operation::RetrievePaymentIntent => "retrievePaymentIntent",
            Operation::CollectPaymentMethod => "collectPaymentMethod",
            Operation::CancelCollectPaymentMethod => "cancelCollectPaymentMethod",
            Operation::ProcessPayment => "processPayment",
            Operation::ClearCachedCredentials => "clearCachedCredentials",
            Operation::SetReaderDisplay => "setReaderDisplay",
            Operation::ClearReaderDisplay => "clearReaderDisplay",
            Operation::ListLocations => "listLocations",
            Operation::GetSimulatorConfiguration => "getSimulatorConfiguration",
            Operation::SetSimulatorConfiguration => "setSimulatorConfiguration",
            Operation::CheckPermissions => "checkPermissions",
            Operation::RequestPermissions => "requestPermissions",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A card reader backend.
///
/// # Examples
///
/// ```no_run
/// use cardlink_backend::{Result, TerminalBackend};
/// use cardlink_core::{DiscoveryConfiguration, DiscoveryMethod};
///
/// async fn scan<B: TerminalBackend>(backend: &B) -> Result<()> {
///     backend.initialize().await?;
///     backend
///         .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
///         .await
/// }
/// ```
pub trait TerminalBackend: Send + Sync + 'static {
    /// Answer the backend's most recent token request, with a token or with
    /// the reason none could be obtained.
    fn set_connection_token(
        &self,
        token: std::result::Result<String, TokenFetchError>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn initialize(&self) -> impl Future<Output = Result<()>> + Send;

    /// Run discovery. Resolves when discovery ends; results arrive as
    /// `readersDiscovered` events in the meantime.
    fn discover_readers(
        &self,
        config: DiscoveryConfiguration,
    ) -> impl Future<Output = Result<()>> + Send;

    fn cancel_discover_readers(&self) -> impl Future<Output = Result<()>> + Send;

    fn connect_bluetooth_reader(
        &self,
        request: LocalConnectRequest,
    ) -> impl Future<Output = Result<Option<Reader>>> + Send;

    fn connect_usb_reader(
        &self,
        request: LocalConnectRequest,
    ) -> impl Future<Output = Result<Option<Reader>>> + Send;

    fn connect_internet_reader(
        &self,
        request: InternetConnectRequest,
    ) -> impl Future<Output = Result<Option<Reader>>> + Send;

    fn get_connected_reader(&self) -> impl Future<Output = Result<Option<Reader>>> + Send;

    fn get_connection_status(&self) -> impl Future<Output = Result<StatusReport>> + Send;

    fn get_payment_status(&self) -> impl Future<Output = Result<Option<PaymentStatus>>> + Send;

    fn disconnect_reader(&self) -> impl Future<Output = Result<()>> + Send;

    fn install_available_update(&self) -> impl Future<Output = Result<()>> + Send;

    fn cancel_install_update(&self) -> impl Future<Output = Result<()>> + Send;

    fn retrieve_payment_intent(
        &self,
        client_secret: String,
    ) -> impl Future<Output = Result<Option<PaymentIntent>>> + Send;

    fn collect_payment_method(&self)
    -> impl Future<Output = Result<Option<PaymentIntent>>> + Send;

    fn cancel_collect_payment_method(&self) -> impl Future<Output = Result<()>> + Send;

    fn process_payment(&self) -> impl Future<Output = Result<Option<PaymentIntent>>> + Send;

    fn clear_cached_credentials(&self) -> impl Future<Output = Result<()>> + Send;

    fn set_reader_display(&self, cart: Cart) -> impl Future<Output = Result<()>> + Send;

    fn clear_reader_display(&self) -> impl Future<Output = Result<()>> + Send;

    fn list_locations(
        &self,
        params: ListLocationsParameters,
    ) -> impl Future<Output = Result<LocationList>> + Send;

    fn get_simulator_configuration(&self) -> impl Future<Output = Result<SimulatorReport>> + Send;

    fn set_simulator_configuration(
        &self,
        config: SimulatorConfiguration,
    ) -> impl Future<Output = Result<SimulatorReport>> + Send;

    fn check_permissions(&self) -> impl Future<Output = Result<PermissionStatus>> + Send;

    fn request_permissions(&self) -> impl Future<Output = Result<PermissionStatus>> + Send;

    /// Subscribe to one event name. The listener stays registered until the
    /// returned handle is removed or dropped.
    fn add_listener(&self, name: EventName, listener: EventListener) -> ListenerHandle;
}
