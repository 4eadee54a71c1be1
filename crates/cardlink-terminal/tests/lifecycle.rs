//! Integration tests for initialization, teardown and the uninitialized
//! guard.

mod common;

use cardlink_backend::mock::MockBackend;
use cardlink_backend::{BackendError, BackendEvent, EventName, Operation};
use cardlink_core::{
    BackendKind, Cart, DeviceType, DiscoveryConfiguration, DiscoveryMethod, HostPlatform,
    PermissionState, PermissionStatus, Reader, SimulatorConfiguration,
};
use cardlink_terminal::{Terminal, TerminalError};
use common::Fixture;

#[tokio::test]
async fn test_operations_fail_before_initialize() {
    let fixture = Fixture::new(HostPlatform::Android);
    let terminal = &fixture.terminal;
    let reader = Reader::with_serial("CHB204909005931");

    assert_eq!(
        terminal.get_connected_reader().await,
        Err(TerminalError::Uninitialized)
    );
    assert_eq!(
        terminal.connect_internet_reader(&reader, None).await,
        Err(TerminalError::Uninitialized)
    );
    assert_eq!(
        terminal.set_reader_display(Cart::default()).await,
        Err(TerminalError::Uninitialized)
    );
    assert_eq!(
        terminal
            .set_simulator_configuration(SimulatorConfiguration::default())
            .await,
        Err(TerminalError::Uninitialized)
    );
    assert_eq!(
        terminal.cancel_discover_readers().await,
        Err(TerminalError::Uninitialized)
    );
    assert!(matches!(
        terminal.discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both)),
        Err(TerminalError::Uninitialized)
    ));
    assert!(matches!(
        terminal.connection_status(),
        Err(TerminalError::Uninitialized)
    ));

    // Nothing reached a backend.
    assert!(fixture.native.calls().is_empty());
    assert!(fixture.browser.calls().is_empty());
}

#[tokio::test]
async fn test_permissions_and_device_style_work_uninitialized() {
    let fixture = Fixture::new(HostPlatform::Android);
    fixture.native.set_permissions(PermissionStatus {
        location: PermissionState::Prompt,
    });

    let status = fixture.terminal.check_permissions().await.unwrap();
    assert_eq!(status.location, PermissionState::Prompt);

    let status = fixture.terminal.request_permissions().await.unwrap();
    assert_eq!(status.location, PermissionState::Prompt);
    assert_eq!(fixture.browser.call_count(Operation::CheckPermissions), 0);

    assert_eq!(
        Terminal::<MockBackend>::device_style(Some(DeviceType::VerifoneP400)),
        DeviceType::VerifoneP400.device_style()
    );
}

#[tokio::test]
async fn test_initialize_registers_listeners_and_initializes_backends() {
    let fixture = Fixture::initialized().await;

    assert!(fixture.terminal.is_initialized());
    assert!(fixture.native.is_initialized());
    assert!(fixture.browser.is_initialized());

    for handle in [&fixture.native, &fixture.browser] {
        assert_eq!(handle.listener_count(EventName::RequestConnectionToken), 1);
        assert_eq!(handle.listener_count(EventName::UnexpectedReaderDisconnect), 1);
    }
}

#[tokio::test]
async fn test_initialize_twice_is_noop() {
    let fixture = Fixture::initialized().await;
    fixture.terminal.initialize().await.unwrap();

    assert_eq!(fixture.native.call_count(Operation::Initialize), 1);
    assert_eq!(fixture.native.total_listeners(), 2);
}

#[tokio::test]
async fn test_initialize_failure_releases_listeners() {
    let fixture = Fixture::new(HostPlatform::Ios);
    fixture
        .browser
        .fail_next(Operation::Initialize, BackendError::other("no webview"));

    let result = fixture.terminal.initialize().await;

    assert_eq!(
        result,
        Err(TerminalError::Backend(BackendError::other("no webview")))
    );
    assert!(!fixture.terminal.is_initialized());
    assert_eq!(fixture.native.total_listeners(), 0);
    assert_eq!(fixture.browser.total_listeners(), 0);
}

#[tokio::test]
async fn test_teardown_releases_everything() {
    let fixture = Fixture::initialized().await;
    let _discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both))
        .unwrap();
    assert!(fixture.browser.listener_count(EventName::ReadersDiscovered) > 0);

    fixture.terminal.teardown().await;

    assert!(!fixture.terminal.is_initialized());
    assert_eq!(fixture.native.total_listeners(), 0);
    assert_eq!(fixture.browser.total_listeners(), 0);
    assert_eq!(
        fixture.terminal.get_connected_reader().await,
        Err(TerminalError::Uninitialized)
    );
}

#[tokio::test]
async fn test_unexpected_disconnect_reaches_callback_normalized() {
    let fixture = Fixture::initialized().await;

    let reader = Reader::with_serial("STRM26138003393")
        .battery_level(0.0)
        .software_version("unknown");
    fixture.browser.emit(BackendEvent::UnexpectedReaderDisconnect {
        reader: Some(reader),
    });
    fixture
        .native
        .emit(BackendEvent::UnexpectedReaderDisconnect { reader: None });

    let seen = fixture.disconnects();
    assert_eq!(seen.len(), 2);

    let reported = seen[0].as_ref().unwrap();
    assert_eq!(reported.serial_number.as_deref(), Some("STRM26138003393"));
    assert_eq!(reported.battery_level, None);
    assert_eq!(reported.device_software_version, None);
    assert_eq!(seen[1], None);
}

#[tokio::test]
async fn test_browser_dropped_on_web_host() {
    let fixture = Fixture::new(HostPlatform::Web);
    fixture.terminal.initialize().await.unwrap();

    assert!(!fixture.browser.is_initialized());
    assert_eq!(fixture.browser.total_listeners(), 0);
    assert_eq!(fixture.terminal.active_backend_kind(), BackendKind::Native);
}

#[test]
fn test_initialize_outside_runtime_fails() {
    let fixture = Fixture::new(HostPlatform::Android);

    let result = futures::executor::block_on(fixture.terminal.initialize());

    assert_eq!(result, Err(TerminalError::NoRuntime));
    assert!(!fixture.terminal.is_initialized());
    assert_eq!(fixture.native.total_listeners(), 0);
    assert!(fixture.native.calls().is_empty());
}
