//! In-memory transport pair for tests and UI demos.
//!
//! [`MockTransport::pair`] returns the client-side transport plus a
//! [`MockPeer`] handle that plays the controller: it receives the
//! client's request messages whole and injects response packets, event
//! frames, and link faults.  The peer methods block, so a test can
//! script the controller from a plain thread while the client runs on
//! its worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, with_timeout};
use futures_lite::future;

use crate::error::{Error, Result};
use crate::observe::StateCell;
use crate::wire::frame;

use super::{ConnectionState, LinkTransport, MAX_PACKET_LEN, Packet};

const CHANNEL_DEPTH: usize = 64;

struct Shared {
    state: StateCell<ConnectionState>,
    /// Client → peer, whole messages (outbound write fragmentation
    /// happens below the mock's visibility).
    to_peer: Channel<CriticalSectionRawMutex, Vec<u8>, CHANNEL_DEPTH>,
    /// Peer → client, individual link packets.
    to_client: Channel<CriticalSectionRawMutex, Packet, CHANNEL_DEPTH>,
    packet_size: usize,
    radio_on: AtomicBool,
    peer_present: AtomicBool,
    /// Fail this many upcoming `connect` calls with `Timeout`.
    failing_connects: AtomicU32,
    connect_count: AtomicU32,
}

/// Client-side half of the pair.
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// Test-side controller handle.
#[derive(Clone)]
pub struct MockPeer {
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a connected pair.  `packet_size` is the link fragmentation
    /// size used for inbound packets (20 in the reference link).
    pub fn pair(packet_size: usize) -> (Self, MockPeer) {
        let shared = Arc::new(Shared {
            state: StateCell::new(ConnectionState::Disconnected),
            to_peer: Channel::new(),
            to_client: Channel::new(),
            packet_size: packet_size.min(MAX_PACKET_LEN),
            radio_on: AtomicBool::new(true),
            peer_present: AtomicBool::new(true),
            failing_connects: AtomicU32::new(0),
            connect_count: AtomicU32::new(0),
        });
        (
            Self {
                shared: shared.clone(),
            },
            MockPeer { shared },
        )
    }
}

impl LinkTransport for MockTransport {
    async fn connect(&self, _address: &str) -> Result<()> {
        self.shared.connect_count.fetch_add(1, Ordering::SeqCst);
        if !self.shared.radio_on.load(Ordering::SeqCst) {
            return Err(Error::TransportUnavailable);
        }
        if self
            .shared
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Timeout);
        }
        if !self.shared.peer_present.load(Ordering::SeqCst) {
            return Err(Error::PeerNotFound);
        }
        self.shared.state.set(ConnectionState::Connecting);
        // Drop anything queued from a previous connection.
        while self.shared.to_client.try_receive().is_ok() {}
        while self.shared.to_peer.try_receive().is_ok() {}
        self.shared.state.set(ConnectionState::Connected);
        Ok(())
    }

    fn disconnect(&self) {
        self.shared.state.set(ConnectionState::Disconnected);
    }

    async fn send(&self, message: &[u8]) -> Result<()> {
        if self.shared.state.get() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        self.shared.to_peer.send(message.to_vec()).await;
        Ok(())
    }

    async fn receive(&self) -> Result<Packet> {
        let mut link = self.shared.state.watch();
        future::or(
            async { Ok(self.shared.to_client.receive().await) },
            async {
                link.until(|s| *s != ConnectionState::Connected).await;
                Err(Error::NotConnected)
            },
        )
        .await
    }

    fn state(&self) -> &StateCell<ConnectionState> {
        &self.shared.state
    }
}

impl MockPeer {
    /// Receive the next request message from the client, blocking up to
    /// `timeout_ms`.
    pub fn recv_message(&self, timeout_ms: u64) -> Result<Vec<u8>> {
        future::block_on(async {
            with_timeout(
                Duration::from_millis(timeout_ms),
                self.shared.to_peer.receive(),
            )
            .await
            .map_err(|_| Error::Timeout)
        })
    }

    /// Whether a request message is already waiting.
    pub fn try_recv_message(&self) -> Option<Vec<u8>> {
        self.shared.to_peer.try_receive().ok()
    }

    /// Inject one raw link packet.
    pub fn send_packet(&self, bytes: &[u8]) -> Result<()> {
        let packet =
            Packet::from_slice(bytes).map_err(|()| Error::InvalidValue("packet too large"))?;
        future::block_on(self.shared.to_client.send(packet));
        Ok(())
    }

    /// Respond to the pending request: header + body split into link
    /// packets.
    pub fn respond(&self, function: u8, status: u8, body: &[u8]) -> Result<()> {
        for packet in frame::encode_response(function, status, body, self.shared.packet_size) {
            self.send_packet(&packet)?;
        }
        Ok(())
    }

    /// Respond, but stop after `keep` packets — simulates packet loss.
    pub fn respond_truncated(&self, function: u8, body: &[u8], keep: usize) -> Result<()> {
        let packets = frame::encode_response(function, 0, body, self.shared.packet_size);
        for packet in packets.iter().take(keep) {
            self.send_packet(packet)?;
        }
        Ok(())
    }

    /// Push a "properties in group changed" event frame.
    pub fn send_properties_changed(&self, group: u8) -> Result<()> {
        self.send_packet(&[frame::EVENT_FUNCTION_ID, 0, group])
    }

    /// Drop the link, as seen from the client.
    pub fn drop_link(&self) {
        self.shared.state.set(ConnectionState::Disconnected);
    }

    /// Turn the simulated radio on or off (affects future connects).
    pub fn set_radio(&self, on: bool) {
        self.shared.radio_on.store(on, Ordering::SeqCst);
    }

    /// Make the peripheral disappear from the air.
    pub fn set_peer_present(&self, present: bool) {
        self.shared.peer_present.store(present, Ordering::SeqCst);
    }

    /// Fail the next `n` connect attempts with `Timeout`.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Total `connect` calls observed, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.connect_count.load(Ordering::SeqCst)
    }
}
