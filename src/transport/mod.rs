//! Transport abstraction — the raw bidirectional packet channel.
//!
//! Concrete implementations wrap whatever link the platform provides:
//! a BLE GATT pair (write characteristic + notify characteristic) in the
//! reference deployment, a TCP socket in development rigs, or the
//! in-memory [`mock`] pair in tests.
//!
//! The session layer is generic over `LinkTransport`, so adding a new
//! link requires no changes to the protocol logic.  The link layer is
//! the only place that knows the packet size: `send` takes one logical
//! message and fragments it; `receive` yields individual inbound
//! packets for the reassembler.

pub mod mock;

use crate::error::{Error, Result};
use crate::observe::StateCell;

/// Upper bound on a single link packet (largest usable BLE ATT payload).
pub const MAX_PACKET_LEN: usize = 256;

/// One inbound link packet.
pub type Packet = heapless::Vec<u8, MAX_PACKET_LEN>;

/// Connection lifecycle of the raw link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// The platform radio is off or missing.
    NoTransport,
    Connecting,
    Connected,
}

/// Byte-packet channel to one peripheral.
///
/// Implementations are shared between the session worker and the state
/// driver, so every method takes `&self`; interior mutability is the
/// implementation's concern.
#[allow(async_fn_in_trait)]
pub trait LinkTransport: Send + Sync + 'static {
    /// Establish the link to the peripheral at `address`.
    ///
    /// Fails with [`Error::TransportUnavailable`] when the radio is off,
    /// [`Error::PeerNotFound`] when the peripheral lacks the expected
    /// service, and [`Error::Timeout`] when the peer does not answer
    /// within the platform's window.
    async fn connect(&self, address: &str) -> Result<()>;

    /// Tear the link down.  Idempotent.
    fn disconnect(&self);

    /// Deliver one logical message.  The link layer splits it into
    /// packet-sized chunks; message boundaries are the peer's concern.
    async fn send(&self, message: &[u8]) -> Result<()>;

    /// Receive the next inbound link packet.  Resolves with
    /// [`Error::NotConnected`] when the link drops so pending readers
    /// unblock.
    async fn receive(&self) -> Result<Packet>;

    /// Observable connection state, updated by the implementation.
    fn state(&self) -> &StateCell<ConnectionState>;
}

/// A transport that is never available.  Useful as a placeholder while
/// the platform layer has no radio to offer.
pub struct NullTransport {
    state: StateCell<ConnectionState>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self {
            state: StateCell::new(ConnectionState::NoTransport),
        }
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkTransport for NullTransport {
    async fn connect(&self, _address: &str) -> Result<()> {
        Err(Error::TransportUnavailable)
    }

    fn disconnect(&self) {}

    async fn send(&self, _message: &[u8]) -> Result<()> {
        Err(Error::NotConnected)
    }

    async fn receive(&self) -> Result<Packet> {
        futures_lite::future::pending().await
    }

    fn state(&self) -> &StateCell<ConnectionState> {
        &self.state
    }
}
