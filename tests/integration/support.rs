//! Shared helpers for the integration suite.

use std::sync::{Arc, Mutex};

use futures_lite::future;

use scenelink::LinkConfig;
use scenelink::fsm::ApplicationState;
use scenelink::ports::{Notice, NoticeSink};
use scenelink::props::codec::{encode_descriptor, encode_value};
use scenelink::props::Property;
use scenelink::session::Session;
use scenelink::transport::LinkTransport;
use scenelink::transport::mock::{MockPeer, MockTransport};
use scenelink::wire::ByteWriter;
use scenelink::wire::frame::FunctionId;
use scenelink::ControllerClient;

/// Short timeouts so failure paths complete quickly.
pub fn test_config() -> LinkConfig {
    LinkConfig {
        packet_size: 20,
        request_timeout_ms: 150,
        reconnect_attempts: 3,
        reconnect_delay_ms: 10,
    }
}

/// A session whose worker runs on its own thread over an
/// already-connected mock link.
pub fn connected_session(config: &LinkConfig) -> (Session, MockPeer) {
    let (transport, peer) = MockTransport::pair(config.packet_size);
    future::block_on(transport.connect("mock-peer")).expect("mock connect");

    let session = Session::new(config);
    let worker = session.clone();
    let _ = std::thread::spawn(move || future::block_on(worker.run(&transport)));
    (session, peer)
}

/// Encode a `GetPropertiesFromGroup` response body.
pub fn encode_group_body(props: &[Property]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.put_u16(props.len() as u16);
    for p in props {
        encode_descriptor(p, &mut w).expect("descriptor");
        encode_value(p, &mut w).expect("value");
    }
    w.into_inner()
}

/// Expect the next request to be `GetPropertiesFromGroup` and answer it.
/// Returns the requested group id.
pub fn answer_next_fetch(peer: &MockPeer, props: &[Property], timeout_ms: u64) -> u8 {
    let msg = peer.recv_message(timeout_ms).expect("fetch request");
    assert_eq!(
        msg[0],
        FunctionId::GetPropertiesFromGroup as u8,
        "expected group fetch, got {msg:?}"
    );
    let group = msg[1];
    peer.respond(msg[0], 0, &encode_group_body(props)).unwrap();
    group
}

/// Notice sink that records everything for later assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    notices: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.recorded().iter().any(|n| n.contains(needle))
    }
}

impl NoticeSink for RecordingSink {
    fn notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(format!("{notice:?}"));
    }
}

/// Block until the client's application state satisfies `pred`.
pub fn wait_app_state(
    client: &ControllerClient,
    timeout_ms: u64,
    pred: impl FnMut(&ApplicationState) -> bool,
) -> ApplicationState {
    future::block_on(async {
        embassy_time::with_timeout(
            embassy_time::Duration::from_millis(timeout_ms),
            client.application_states().watch().until(pred),
        )
        .await
        .expect("timed out waiting for application state")
    })
}
