//! Integration tests for the full discovery and connection flow.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use peerlink::bluetooth::mock::{ConnectBehavior, EventRecorder, MockPermission, MockRadio};
use peerlink::bluetooth::{PeerManager, RadioSignal, RadioStack};
use peerlink::config::Config;
use peerlink::events::{DispatchQueue, QueueDispatcher};
use peerlink::{
    ConnectionState, DiscoveryState, PeerAddress, PeerOrigin, RemotePeer, SessionError,
    SessionEvent,
};

struct Harness {
    radio: Arc<MockRadio>,
    permission: Arc<MockPermission>,
    manager: PeerManager,
    recorder: Arc<EventRecorder>,
    queue: DispatchQueue,
}

fn harness() -> Harness {
    let mut config = Config::default();
    config.discovery.refresh_paired_on_scan = false;
    harness_with(&config)
}

fn harness_with(config: &Config) -> Harness {
    let radio = MockRadio::new();
    let permission = MockPermission::new(true);
    let (dispatcher, queue) = QueueDispatcher::new();
    let manager = PeerManager::from_config(
        radio.clone(),
        permission.clone(),
        Arc::new(dispatcher),
        Handle::current(),
        config,
    );
    let recorder = EventRecorder::new();
    manager.attach_listener(recorder.clone());

    Harness {
        radio,
        permission,
        manager,
        recorder,
        queue,
    }
}

fn peer(s: &str) -> PeerAddress {
    PeerAddress::new(s).unwrap()
}

async fn pump(h: &Harness, n: usize) {
    let wait = async {
        while h.recorder.len() < n {
            h.queue.run_next().await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for notifications");
}

async fn wait_for_held_connect(radio: &MockRadio) {
    for _ in 0..500 {
        if radio.last_socket().map(|s| s.is_waiting()).unwrap_or(false) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("connect never started");
}

#[tokio::test]
async fn test_discovery_scenario() {
    let h = harness();

    h.manager.start_scan().unwrap();
    h.manager.handle_signal(RadioSignal::ScanStarted);
    h.manager
        .handle_signal(RadioSignal::PeerFound(RemotePeer::new("AA:BB", "Phone")));
    h.manager
        .handle_signal(RadioSignal::PeerFound(RemotePeer::new("AA:BB", "Phone2")));
    h.manager.handle_signal(RadioSignal::ScanFinished);

    h.queue.run_pending();
    assert_eq!(
        h.recorder.events(),
        vec![
            SessionEvent::ScanStarted,
            SessionEvent::PeerListChanged,
            SessionEvent::PeerListChanged,
            SessionEvent::ScanFinished,
        ]
    );

    let discovered = h.manager.registry().discovered();
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].address, peer("AA:BB"));
    assert_eq!(discovered[0].display_name, "Phone2");
    assert_eq!(h.manager.discovery_state(), DiscoveryState::Idle);
}

#[tokio::test]
async fn test_discovery_scenario_with_default_config() {
    let h = harness_with(&Config::default());

    h.manager.handle_signal(RadioSignal::ScanStarted);
    h.manager
        .handle_signal(RadioSignal::PeerFound(RemotePeer::new("AA:BB", "Phone")));
    h.manager
        .handle_signal(RadioSignal::PeerFound(RemotePeer::new("AA:BB", "Phone2")));
    h.manager.handle_signal(RadioSignal::ScanFinished);

    // Let the background paired refresh started by the scan settle.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.manager.refresh_paired().await.unwrap().unwrap(), 0);

    h.queue.run_pending();
    assert_eq!(
        h.recorder.events(),
        vec![
            SessionEvent::ScanStarted,
            SessionEvent::PeerListChanged,
            SessionEvent::PeerListChanged,
            SessionEvent::ScanFinished,
        ]
    );
    assert!(h.manager.registry().paired().is_empty());
}

#[tokio::test]
async fn test_scan_blocked_without_permission() {
    let h = harness();
    h.permission.set_granted(false);

    assert!(matches!(
        h.manager.start_scan(),
        Err(SessionError::PermissionDenied)
    ));
    assert_eq!(h.radio.start_discovery_calls(), 0);
}

#[tokio::test]
async fn test_select_and_connect() {
    let h = harness();
    h.radio.set_connect_behavior(ConnectBehavior::Hold);

    h.manager.handle_signal(RadioSignal::ScanStarted);
    h.manager
        .handle_signal(RadioSignal::PeerFound(RemotePeer::new("AA:BB", "Phone")));
    h.manager.handle_signal(RadioSignal::ScanFinished);
    h.queue.run_pending();
    h.recorder.clear();

    h.manager.connect_to("AA:BB").unwrap();
    assert!(matches!(
        h.manager.connect_to("CC:DD"),
        Err(SessionError::UnknownPeer(_))
    ));
    assert!(matches!(
        h.manager.connect(peer("CC:DD")),
        Err(SessionError::AlreadyConnecting { .. })
    ));

    wait_for_held_connect(&h.radio).await;
    h.radio.release(Ok(()));
    pump(&h, 2).await;

    assert_eq!(
        h.recorder.events(),
        vec![
            SessionEvent::Connecting(peer("AA:BB")),
            SessionEvent::Connected(peer("AA:BB")),
        ]
    );
    assert_eq!(h.manager.connection_state(), ConnectionState::Connected);
    assert_eq!(h.manager.connection().target(), Some(peer("AA:BB")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_before_transport_completes() {
    let h = harness();
    h.radio.set_connect_behavior(ConnectBehavior::Hold);

    h.manager.connect(peer("AA:BB")).unwrap();
    assert!(h.manager.cancel());

    // Let the background attempt run into the closed socket.
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.radio.release(Ok(()));
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.queue.run_pending();

    let events = h.recorder.events();
    assert_eq!(events[0], SessionEvent::Connecting(peer("AA:BB")));
    assert_eq!(h.recorder.terminal_count(), 1);
    assert!(matches!(
        events[1],
        SessionEvent::Cancelled(_) | SessionEvent::ConnectFailed { .. }
    ));
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::Connected(_))));
    assert_eq!(h.manager.connection_state(), ConnectionState::Cancelled);
}

#[tokio::test]
async fn test_dropping_manager_cancels_attempt() {
    let h = harness();
    h.radio.set_connect_behavior(ConnectBehavior::Hold);

    h.manager.connect(peer("AA:BB")).unwrap();
    wait_for_held_connect(&h.radio).await;
    drop(h.manager);

    let socket = h.radio.last_socket().unwrap();
    assert!(socket.is_closed());
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.queue.run_pending();

    assert_eq!(
        h.recorder.events(),
        vec![
            SessionEvent::Connecting(peer("AA:BB")),
            SessionEvent::Cancelled(peer("AA:BB")),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_from_another_thread() {
    let h = harness();
    h.radio.set_connect_behavior(ConnectBehavior::Hold);

    h.manager.connect(peer("AA:BB")).unwrap();
    wait_for_held_connect(&h.radio).await;

    let connection = h.manager.connection().clone();
    let cancelled = std::thread::spawn(move || connection.cancel())
        .join()
        .unwrap();
    assert!(cancelled);

    pump(&h, 2).await;
    assert_eq!(h.recorder.events()[1], SessionEvent::Cancelled(peer("AA:BB")));
    assert!(h.radio.last_socket().unwrap().is_closed());
}

#[tokio::test]
async fn test_paired_refresh_on_scan() {
    let radio = MockRadio::new();
    radio.set_bonded(vec![
        RemotePeer::new("11:22", "Headset"),
        RemotePeer::new("AA:BB", "Phone"),
    ]);
    let (dispatcher, queue) = QueueDispatcher::new();
    let manager = PeerManager::from_config(
        radio.clone(),
        MockPermission::new(true),
        Arc::new(dispatcher),
        Handle::current(),
        &Config::default(),
    );
    let recorder = EventRecorder::new();
    manager.attach_listener(recorder.clone());

    manager.handle_signal(RadioSignal::ScanStarted);
    manager.handle_signal(RadioSignal::PeerFound(RemotePeer::new("AA:BB", "Phone (nearby)")));

    let wait = async {
        while recorder.len() < 3 {
            queue.run_next().await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait).await.unwrap();

    assert_eq!(manager.registry().paired().len(), 2);
    let record = manager.registry().get(&peer("AA:BB")).unwrap();
    assert_eq!(record.origin, PeerOrigin::Paired);

    let peers = manager.peers();
    assert_eq!(peers.len(), 3);
    assert_eq!(peers[0].origin, PeerOrigin::Paired);
    assert_eq!(peers[2].origin, PeerOrigin::Discovered);
}

#[tokio::test]
async fn test_toggle_radio_and_shutdown() {
    let h = harness();

    assert!(!h.manager.toggle_radio().unwrap());
    assert!(!h.manager.is_radio_enabled());
    assert!(matches!(
        h.manager.connect(peer("AA:BB")),
        Err(SessionError::RadioDisabled)
    ));
    assert!(matches!(h.manager.start_scan(), Err(SessionError::RadioDisabled)));

    assert!(h.manager.toggle_radio().unwrap());
    assert_eq!(h.radio.enable_requests(), 1);

    h.manager.start_scan().unwrap();
    h.manager.handle_signal(RadioSignal::ScanStarted);
    h.manager.connect(peer("AA:BB")).unwrap();
    pump(&h, 3).await;

    h.manager.shutdown();
    pump(&h, 4).await;
    assert_eq!(
        h.recorder.events()[3],
        SessionEvent::Disconnected(peer("AA:BB"))
    );
    assert!(!h.radio.is_discovering());
}
