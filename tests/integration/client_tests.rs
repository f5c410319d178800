//! Full-stack tests: state driver, reconnection, and event-driven
//! resync through the public client surface.

use std::time::Duration as StdDuration;

use futures_lite::future;

use scenelink::ControllerClient;
use scenelink::fsm::{ApplicationState, DeviceState};
use scenelink::ports::ConnectivityFeed;
use scenelink::props::GroupId;
use scenelink::transport::mock::{MockPeer, MockTransport};

use crate::support::{RecordingSink, answer_next_fetch, test_config, wait_app_state};

/// Spawn a client over a mock link with the radio on.
fn spawn_client() -> (ControllerClient, MockPeer, ConnectivityFeed, RecordingSink) {
    spawn_client_with(test_config())
}

fn spawn_client_with(
    config: scenelink::LinkConfig,
) -> (ControllerClient, MockPeer, ConnectivityFeed, RecordingSink) {
    let (transport, peer) = MockTransport::pair(config.packet_size);
    let connectivity = ConnectivityFeed::new(true);
    let sink = RecordingSink::new();
    let client = ControllerClient::spawn(transport, config, &connectivity, sink.clone()).unwrap();
    (client, peer, connectivity, sink)
}

/// Answer the two startup group fetches (Global, then Scene).
fn serve_initial_sync(peer: &MockPeer) {
    assert_eq!(answer_next_fetch(peer, &[], 2000), GroupId::Global as u8);
    assert_eq!(answer_next_fetch(peer, &[], 2000), GroupId::Scene as u8);
}

#[test]
fn lifecycle_reaches_ready() {
    let (client, peer, _connectivity, _sink) = spawn_client();

    client.connect("AA:BB:CC:DD:EE:FF");
    serve_initial_sync(&peer);

    let state = wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);
    assert_eq!(state, ApplicationState::Ready);
    assert_eq!(client.device_state(), DeviceState::Ready);
}

#[test]
fn event_triggers_exactly_one_scene_fetch() {
    let (client, peer, _connectivity, _sink) = spawn_client();
    client.connect("mock");
    serve_initial_sync(&peer);
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);

    // `[255][0][2]` — properties changed in group 2 (Scene).
    peer.send_properties_changed(2).unwrap();

    let group = answer_next_fetch(&peer, &[], 2000);
    assert_eq!(group, GroupId::Scene as u8);

    // Exactly one fetch: nothing else shows up on the wire.
    std::thread::sleep(StdDuration::from_millis(100));
    assert!(
        peer.try_recv_message().is_none(),
        "event caused more than one fetch"
    );
}

#[test]
fn connection_loss_reconnects_and_resyncs() {
    // A long reconnect delay keeps the Reconnecting state observable.
    let config = scenelink::LinkConfig {
        reconnect_delay_ms: 100,
        ..test_config()
    };
    let (client, peer, _connectivity, _sink) = spawn_client_with(config);
    client.connect("mock");
    serve_initial_sync(&peer);
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);

    peer.drop_link();
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Reconnecting);

    // The mock accepts the reconnect; the driver resyncs both groups.
    serve_initial_sync(&peer);
    let state = wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);
    assert_eq!(state, ApplicationState::Ready);
}

#[test]
fn reconnect_exhaustion_lands_in_disconnected() {
    let (client, peer, _connectivity, sink) = spawn_client();
    client.connect("mock");
    serve_initial_sync(&peer);
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);

    let attempts_before = peer.connect_attempts();
    peer.fail_next_connects(u32::MAX);
    peer.drop_link();

    let state = wait_app_state(&client, 3000, |s| *s == ApplicationState::Disconnected);
    assert_eq!(state, ApplicationState::Disconnected);

    // Exactly the configured number of attempts, then no more.
    let attempts_after = peer.connect_attempts();
    assert_eq!(attempts_after - attempts_before, test_config().reconnect_attempts);
    std::thread::sleep(StdDuration::from_millis(100));
    assert_eq!(
        peer.connect_attempts(),
        attempts_after,
        "driver kept reconnecting after exhaustion"
    );

    assert!(sink.contains("ReconnectExhausted"));
}

#[test]
fn failed_connect_surfaces_one_notice() {
    let (client, peer, _connectivity, sink) = spawn_client();
    peer.set_peer_present(false);

    client.connect("mock");

    // The failure produces exactly one notice...
    let mut waited = 0;
    while sink.recorded().is_empty() && waited < 2000 {
        std::thread::sleep(StdDuration::from_millis(10));
        waited += 10;
    }
    assert!(sink.contains("PeerNotFound"));
    assert_eq!(sink.recorded().len(), 1);

    // ...and the machine settles back in Disconnected (via
    // WaitingForConnectivity, since the radio is still on).
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Disconnected);
}

#[test]
fn connectivity_gates_connect_attempts() {
    let config = test_config();
    let (transport, peer) = MockTransport::pair(config.packet_size);
    let connectivity = ConnectivityFeed::new(false);
    let sink = RecordingSink::new();
    let client = ControllerClient::spawn(transport, config, &connectivity, sink).unwrap();

    // Radio off: the pick is queued, nothing happens.
    client.connect("mock");
    std::thread::sleep(StdDuration::from_millis(50));
    assert_eq!(
        client.application_state(),
        ApplicationState::WaitingForConnectivity
    );
    assert_eq!(peer.connect_attempts(), 0);

    // Radio on: the queued pick connects and syncs.
    connectivity.set(true);
    serve_initial_sync(&peer);
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);
}

#[test]
fn ping_round_trips_when_ready() {
    let (client, peer, _connectivity, _sink) = spawn_client();
    client.connect("mock");
    serve_initial_sync(&peer);
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);

    let script = std::thread::spawn(move || {
        let msg = peer.recv_message(1000).unwrap();
        assert_eq!(msg, vec![6]);
        peer.respond(6, 0, &[]).unwrap();
    });
    future::block_on(client.ping()).unwrap();
    script.join().unwrap();
}

#[test]
fn user_disconnect_is_clean() {
    let (client, peer, _connectivity, sink) = spawn_client();
    client.connect("mock");
    serve_initial_sync(&peer);
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Ready);

    client.disconnect();
    wait_app_state(&client, 2000, |s| *s == ApplicationState::Disconnected);
    assert_eq!(client.device_state(), DeviceState::Disconnected);

    // A clean disconnect is not a failure: no notices, no reconnects.
    std::thread::sleep(StdDuration::from_millis(80));
    assert!(sink.recorded().is_empty());
    assert_eq!(
        client.application_state(),
        ApplicationState::Disconnected
    );
    drop(peer);
}

#[test]
fn shutdown_stops_worker() {
    let (client, _peer, _connectivity, _sink) = spawn_client();
    client.shutdown();
}
