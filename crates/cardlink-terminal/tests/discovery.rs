//! Integration tests for discovery sessions: backend selection, options
//! handed to each backend, merging, cancellation and failure.

mod common;

use cardlink_backend::{BackendError, BackendEvent, EventName, Operation};
use cardlink_core::{BackendKind, DiscoveryConfiguration, DiscoveryMethod, Reader};
use cardlink_terminal::TerminalError;
use common::{Fixture, eventually, reader};
use futures::StreamExt;

fn serials(readers: &[Reader]) -> Vec<&str> {
    readers
        .iter()
        .filter_map(|reader| reader.serial_number.as_deref())
        .collect()
}

#[tokio::test]
async fn test_internet_discovery_uses_browser_only() {
    let fixture = Fixture::initialized().await;
    let config = DiscoveryConfiguration::new(DiscoveryMethod::Internet).with_location_id("tml_1");

    let _discovery = fixture.terminal.discover_readers(config).unwrap();
    eventually(|| fixture.browser.is_discovering()).await;

    assert_eq!(fixture.terminal.active_backend_kind(), BackendKind::Browser);
    assert!(fixture.native.discovery_calls().is_empty());
    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 0);

    let calls = fixture.browser.discovery_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].discovery_method, DiscoveryMethod::Internet);
    assert_eq!(calls[0].location_id.as_deref(), Some("tml_1"));
}

#[tokio::test]
async fn test_both_runs_bluetooth_scan_and_internet() {
    let fixture = Fixture::initialized().await;
    let config = DiscoveryConfiguration::new(DiscoveryMethod::Both)
        .simulated(true)
        .with_location_id("tml_1");

    let _discovery = fixture.terminal.discover_readers(config).unwrap();
    eventually(|| fixture.native.is_discovering() && fixture.browser.is_discovering()).await;

    assert_eq!(fixture.terminal.active_backend_kind(), BackendKind::Native);

    let native = fixture.native.discovery_calls();
    assert_eq!(native.len(), 1);
    assert_eq!(native[0].discovery_method, DiscoveryMethod::BluetoothScan);
    assert_eq!(native[0].location_id, None);
    assert!(native[0].simulated);

    let browser = fixture.browser.discovery_calls();
    assert_eq!(browser.len(), 1);
    assert_eq!(browser[0].discovery_method, DiscoveryMethod::Internet);
    assert_eq!(browser[0].location_id.as_deref(), Some("tml_1"));
    assert!(browser[0].simulated);
}

#[tokio::test]
async fn test_usb_discovery_drops_location() {
    let fixture = Fixture::initialized().await;
    let config = DiscoveryConfiguration::new(DiscoveryMethod::UsbScan).with_location_id("tml_1");

    let _discovery = fixture.terminal.discover_readers(config).unwrap();
    eventually(|| fixture.native.is_discovering()).await;

    let calls = fixture.native.discovery_calls();
    assert_eq!(calls[0].discovery_method, DiscoveryMethod::UsbScan);
    assert_eq!(calls[0].location_id, None);
    assert!(fixture.browser.discovery_calls().is_empty());
}

#[tokio::test]
async fn test_both_merges_primary_then_secondary() {
    let fixture = Fixture::initialized().await;
    let mut discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both))
        .unwrap();

    fixture.native.emit_readers(vec![reader("A"), reader("B")]);
    let batch = discovery.next().await.unwrap().unwrap();
    assert_eq!(serials(&batch), ["A", "B"]);

    fixture.browser.emit_readers(vec![reader("C")]);
    let batch = discovery.next().await.unwrap().unwrap();
    assert_eq!(serials(&batch), ["A", "B", "C"]);

    fixture.browser.emit_readers(vec![reader("C"), reader("D")]);
    let batch = discovery.next().await.unwrap().unwrap();
    assert_eq!(serials(&batch), ["A", "B", "C", "D"]);

    fixture.native.emit_readers(vec![reader("E")]);
    let batch = discovery.next().await.unwrap().unwrap();
    assert_eq!(serials(&batch), ["E", "C", "D"]);
}

#[tokio::test]
async fn test_discovered_readers_are_normalized() {
    let fixture = Fixture::initialized().await;
    let mut discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
        .unwrap();

    fixture.native.emit_readers(vec![
        reader("A").battery_level(0.0).software_version("unknown"),
        reader("B").battery_level(0.5).software_version("2.7.2.0"),
    ]);

    let batch = discovery.next().await.unwrap().unwrap();
    assert_eq!(batch[0].battery_level, None);
    assert_eq!(batch[0].device_software_version, None);
    assert_eq!(batch[1].battery_level, Some(0.5));
    assert_eq!(batch[1].device_software_version.as_deref(), Some("2.7.2.0"));
}

#[tokio::test]
async fn test_tick_without_list_is_empty() {
    let fixture = Fixture::initialized().await;
    let mut discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
        .unwrap();

    fixture
        .native
        .emit(BackendEvent::ReadersDiscovered { readers: None });

    let batch = discovery.next().await.unwrap().unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn test_primary_success_ends_stream_and_releases_listeners() {
    let fixture = Fixture::initialized().await;
    let mut discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both))
        .unwrap();
    eventually(|| fixture.native.is_discovering()).await;

    assert!(fixture.native.complete_discovery(Ok(())));

    assert!(discovery.next().await.is_none());
    assert!(!fixture.terminal.is_discovering());
    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 0);
    assert_eq!(fixture.browser.listener_count(EventName::ReadersDiscovered), 0);

    // A finished session is not canceled on drop.
    drop(discovery);
    tokio::task::yield_now().await;
    assert_eq!(fixture.native.call_count(Operation::CancelDiscoverReaders), 0);
}

#[tokio::test]
async fn test_primary_failure_errors_stream() {
    let fixture = Fixture::initialized().await;
    let mut discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
        .unwrap();
    eventually(|| fixture.native.is_discovering()).await;

    let error = BackendError::rejected("discoverReaders", "Bluetooth is off");
    fixture.native.complete_discovery(Err(error.clone()));

    assert_eq!(
        discovery.next().await,
        Some(Err(TerminalError::Discovery(error)))
    );
    assert!(discovery.next().await.is_none());
}

#[tokio::test]
async fn test_secondary_failure_is_ignored() {
    let fixture = Fixture::initialized().await;
    fixture.browser.fail_next(
        Operation::DiscoverReaders,
        BackendError::rejected("discoverReaders", "no location"),
    );

    let mut discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both))
        .unwrap();
    eventually(|| fixture.browser.call_count(Operation::DiscoverReaders) == 1).await;

    fixture.native.emit_readers(vec![reader("A")]);
    let batch = discovery.next().await.unwrap().unwrap();
    assert_eq!(serials(&batch), ["A"]);
}

#[tokio::test]
async fn test_cancel_stops_both_backends() {
    let fixture = Fixture::initialized().await;
    let discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both))
        .unwrap();
    eventually(|| fixture.native.is_discovering() && fixture.browser.is_discovering()).await;
    assert!(fixture.terminal.is_discovering());

    discovery.cancel().await;

    assert!(!fixture.terminal.is_discovering());

    assert_eq!(fixture.native.call_count(Operation::CancelDiscoverReaders), 1);
    assert_eq!(fixture.browser.call_count(Operation::CancelDiscoverReaders), 1);
    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 0);
    assert_eq!(fixture.browser.listener_count(EventName::ReadersDiscovered), 0);
}

#[tokio::test]
async fn test_dropping_stream_cancels_session() {
    let fixture = Fixture::initialized().await;
    let discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
        .unwrap();
    eventually(|| fixture.native.is_discovering()).await;

    drop(discovery);

    // Listeners go synchronously, the backend cancel runs as a task.
    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 0);
    eventually(|| fixture.native.call_count(Operation::CancelDiscoverReaders) == 1).await;
    assert_eq!(fixture.browser.call_count(Operation::CancelDiscoverReaders), 1);
}

#[tokio::test]
async fn test_cancel_errors_are_swallowed() {
    let fixture = Fixture::initialized().await;
    fixture.native.fail_next(
        Operation::CancelDiscoverReaders,
        BackendError::rejected("cancelDiscoverReaders", "nothing to cancel"),
    );
    fixture.browser.fail_next(
        Operation::CancelDiscoverReaders,
        BackendError::unsupported("cancelDiscoverReaders"),
    );

    let _discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
        .unwrap();
    eventually(|| fixture.native.is_discovering()).await;

    assert_eq!(fixture.terminal.cancel_discover_readers().await, Ok(()));
    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 0);
}

#[tokio::test]
async fn test_cancel_without_session_only_releases_listeners() {
    let fixture = Fixture::initialized().await;

    assert_eq!(fixture.terminal.cancel_discover_readers().await, Ok(()));
    assert_eq!(fixture.native.call_count(Operation::CancelDiscoverReaders), 0);
    assert_eq!(fixture.browser.call_count(Operation::CancelDiscoverReaders), 0);
}

#[tokio::test]
async fn test_new_session_supersedes_previous() {
    let fixture = Fixture::initialized().await;
    let first = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::Both))
        .unwrap();
    let mut second = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
        .unwrap();
    assert!(second.session_id() > first.session_id());

    // Only the second session listens, and only on native.
    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 1);
    assert_eq!(fixture.browser.listener_count(EventName::ReadersDiscovered), 0);

    fixture.native.emit_readers(vec![reader("A")]);
    let batch = second.next().await.unwrap().unwrap();
    assert_eq!(serials(&batch), ["A"]);

    // Dropping the superseded stream leaves the current session alone.
    drop(first);
    tokio::task::yield_now().await;
    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 1);
    assert_eq!(fixture.native.call_count(Operation::CancelDiscoverReaders), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_session_ending_while_next_begins_keeps_new_listeners() {
    let fixture = Fixture::initialized().await;
    let config = || DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan);
    let mut current = fixture.terminal.discover_readers(config()).unwrap();

    for round in 0..25 {
        eventually(|| fixture.native.is_discovering()).await;

        // The finishing session's task runs on a worker while the next
        // session starts here.
        assert!(fixture.native.complete_discovery(Ok(())));
        let next = fixture.terminal.discover_readers(config()).unwrap();
        let mut finished = std::mem::replace(&mut current, next);
        assert!(finished.next().await.is_none());

        assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 1);
        let serial = format!("R{round}");
        fixture.native.emit_readers(vec![reader(&serial)]);
        let batch = current.next().await.unwrap().unwrap();
        assert_eq!(serials(&batch), [serial.as_str()]);
    }
}

#[tokio::test]
async fn test_stream_dropped_off_runtime_still_cancels() {
    let fixture = Fixture::initialized().await;
    let discovery = fixture
        .terminal
        .discover_readers(DiscoveryConfiguration::new(DiscoveryMethod::BluetoothScan))
        .unwrap();
    eventually(|| fixture.native.is_discovering()).await;

    std::thread::spawn(move || drop(discovery)).join().unwrap();

    assert_eq!(fixture.native.listener_count(EventName::ReadersDiscovered), 0);
    eventually(|| fixture.native.call_count(Operation::CancelDiscoverReaders) == 1).await;
}
