//! Enum wrapper for backend dispatch.
//!
//! [`TerminalBackend`] uses native async methods and is not object safe, so
//! `Box<dyn TerminalBackend>` is not available. [`AnyBackend`] gives the
//! orchestration layer one concrete type for a native backend and a browser
//! backend of different types.
//!
//! # Examples
//!
//! ```
//! use cardlink_backend::dispatch::AnyBackend;
//! use cardlink_backend::mock::MockBackend;
//!
//! let (native, _native_handle) = MockBackend::new();
//! let (browser, _browser_handle) = MockBackend::new();
//!
//! let native: AnyBackend<MockBackend, MockBackend> = AnyBackend::Native(native);
//! let browser: AnyBackend<MockBackend, MockBackend> = AnyBackend::Browser(browser);
//! assert!(native.is_native());
//! assert!(!browser.is_native());
//! ```

use crate::error::{Result, TokenFetchError};
use crate::events::EventName;
use crate::listener::{EventListener, ListenerHandle};
use crate::traits::TerminalBackend;
use cardlink_core::{
    Cart, DiscoveryConfiguration, InternetConnectRequest, ListLocationsParameters,
    LocalConnectRequest, LocationList, PaymentIntent, PaymentStatus, PermissionStatus, Reader,
    SimulatorConfiguration, SimulatorReport, StatusReport,
};

/// Either of two backend types.
#[derive(Debug)]
pub enum AnyBackend<N, W> {
    /// In-process hardware backend.
    Native(N),
    /// Browser-hosted backend.
    Browser(W),
}

impl<N, W> AnyBackend<N, W> {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            Self::Native($backend) => $call,
            Self::Browser($backend) => $call,
        }
    };
}

impl<N, W> TerminalBackend for AnyBackend<N, W>
where
    N: TerminalBackend,
    W: TerminalBackend,
{
    async fn set_connection_token(
        &self,
        token: std::result::Result<String, TokenFetchError>,
    ) -> Result<()> {
        dispatch!(self, b => b.set_connection_token(token).await)
    }

    async fn initialize(&self) -> Result<()> {
        dispatch!(self, b => b.initialize().await)
    }

    async fn discover_readers(&self, config: DiscoveryConfiguration) -> Result<()> {
        dispatch!(self, b => b.discover_readers(config).await)
    }

    async fn cancel_discover_readers(&self) -> Result<()> {
        dispatch!(self, b => b.cancel_discover_readers().await)
    }

    async fn connect_bluetooth_reader(&self, request: LocalConnectRequest) -> Result<Option<Reader>> {
        dispatch!(self, b => b.connect_bluetooth_reader(request).await)
    }

    async fn connect_usb_reader(&self, request: LocalConnectRequest) -> Result<Option<Reader>> {
        dispatch!(self, b => b.connect_usb_reader(request).await)
    }

    async fn connect_internet_reader(
        &self,
        request: InternetConnectRequest,
    ) -> Result<Option<Reader>> {
        dispatch!(self, b => b.connect_internet_reader(request).await)
    }

    async fn get_connected_reader(&self) -> Result<Option<Reader>> {
        dispatch!(self, b => b.get_connected_reader().await)
    }

    async fn get_connection_status(&self) -> Result<StatusReport> {
        dispatch!(self, b => b.get_connection_status().await)
    }

    async fn get_payment_status(&self) -> Result<Option<PaymentStatus>> {
        dispatch!(self, b => b.get_payment_status().await)
    }

    async fn disconnect_reader(&self) -> Result<()> {
        dispatch!(self, b => b.disconnect_reader().await)
    }

    async fn install_available_update(&self) -> Result<()> {
        dispatch!(self, b => b.install_available_update().await)
    }

    async fn cancel_install_update(&self) -> Result<()> {
        dispatch!(self, b => b.cancel_install_update().await)
    }

    async fn retrieve_payment_intent(&self, client_secret: String) -> Result<Option<PaymentIntent>> {
        dispatch!(self, b => b.retrieve_payment_intent(client_secret).await)
    }

    async fn collect_payment_method(&self) -> Result<Option<PaymentIntent>> {
        dispatch!(self, b => b.collect_payment_method().await)
    }

    async fn cancel_collect_payment_method(&self) -> Result<()> {
        dispatch!(self, b => b.cancel_collect_payment_method().await)
    }

    async fn process_payment(&self) -> Result<Option<PaymentIntent>> {
        dispatch!(self, b => b.process_payment().await)
    }

    async fn clear_cached_credentials(&self) -> Result<()> {
        dispatch!(self, b => b.clear_cached_credentials().await)
    }

    async fn set_reader_display(&self, cart: Cart) -> Result<()> {
        dispatch!(self, b => b.set_reader_display(cart).await)
    }

    async fn clear_reader_display(&self) -> Result<()> {
        dispatch!(self, b => b.clear_reader_display().await)
    }

    async fn list_locations(&self, params: ListLocationsParameters) -> Result<LocationList> {
        dispatch!(self, b => b.list_locations(params).await)
    }

    async fn get_simulator_configuration(&self) -> Result<SimulatorReport> {
        dispatch!(self, b => b.get_simulator_configuration().await)
    }

    async fn set_simulator_configuration(
        &self,
        config: SimulatorConfiguration,
    ) -> Result<SimulatorReport> {
        dispatch!(self, b => b.set_simulator_configuration(config).await)
    }

    async fn check_permissions(&self) -> Result<PermissionStatus> {
        dispatch!(self, b => b.check_permissions().await)
    }

    async fn request_permissions(&self) -> Result<PermissionStatus> {
        dispatch!(self, b => b.request_permissions().await)
    }

    fn add_listener(&self, name: EventName, listener: EventListener) -> ListenerHandle {
        dispatch!(self, b => b.add_listener(name, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use cardlink_core::{DeviceType, LocalConnectRequest};

    type Either = AnyBackend<MockBackend, MockBackend>;

    #[tokio::test]
    async fn test_any_backend_forwards_calls() {
        let (mock, handle) = MockBackend::new();
        handle.set_connect_response(Some(
            Reader::with_serial("CHB2").device_type(DeviceType::Chipper2X),
        ));
        let backend: Either = AnyBackend::Native(mock);

        let reader = backend
            .connect_bluetooth_reader(LocalConnectRequest {
                serial_number: Some("CHB2".into()),
                location_id: "tml_1".into(),
            })
            .await
            .unwrap();

        assert_eq!(reader.unwrap().serial_number.as_deref(), Some("CHB2"));
        assert_eq!(handle.call_count(crate::Operation::ConnectBluetoothReader), 1);
    }

    #[tokio::test]
    async fn test_any_backend_forwards_listeners() {
        let (mock, handle) = MockBackend::new();
        let backend: Either = AnyBackend::Browser(mock);

        let listener = backend.add_listener(
            EventName::ReadersDiscovered,
            std::sync::Arc::new(|_event: &crate::BackendEvent| {}),
        );
        assert_eq!(handle.listener_count(EventName::ReadersDiscovered), 1);

        listener.remove();
        assert_eq!(handle.listener_count(EventName::ReadersDiscovered), 0);
    }
}
