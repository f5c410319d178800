//! Count-driven response reassembly.
//!
//! The first packet of a response carries the header declaring how many
//! link packets the response spans and how many body bytes it holds.
//! The reassembler accumulates exactly that many packets, then slices
//! the body out of the concatenated buffer:
//!
//! ```text
//! packet 1   [header:6][body.....]   ┐
//! packet 2   [.....body.....]        ├─▶ buffer ─▶ body = buffer[6 .. 6+bodySize]
//! packet 3   [..body][padding]       ┘
//! ```
//!
//! Events are single-packet frames with their own reserved function id
//! and never pass through here.  Once reassembly has started, every
//! incoming packet is a continuation — the packet count is the only
//! delimiter the wire provides.
//!
//! The session owns one reassembler and enforces the response timeout;
//! on expiry it reads [`Reassembler::progress`] to report
//! `PacketLoss(received, expected)`.

use crate::error::{Error, Result};

use super::frame::{RESPONSE_HEADER_LEN, ResponseHeader};

/// A fully reassembled response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub function: u8,
    pub status: u8,
    pub body: Vec<u8>,
}

/// Accumulates response packets into one message.
pub struct Reassembler {
    header: Option<ResponseHeader>,
    buf: Vec<u8>,
    received: u16,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            header: None,
            buf: Vec::new(),
            received: 0,
        }
    }

    /// Whether a partially received response is pending.
    pub fn is_active(&self) -> bool {
        self.header.is_some()
    }

    /// Packets received so far versus packets declared by the header.
    /// `(0, 0)` while idle.
    pub fn progress(&self) -> (u16, u16) {
        match &self.header {
            Some(h) => (self.received, h.packet_count),
            None => (0, 0),
        }
    }

    /// Feed one link packet.
    ///
    /// Returns `Ok(Some(response))` when the declared packet count has
    /// been reached, `Ok(None)` while more packets are expected.  The
    /// first packet must parse as a header or the whole response is
    /// rejected with `MalformedHeader`.
    pub fn feed(&mut self, packet: &[u8]) -> Result<Option<Response>> {
        let header = match self.header {
            Some(h) => h,
            None => {
                let h = ResponseHeader::parse(packet)?;
                self.buf.clear();
                self.received = 0;
                self.header = Some(h);
                h
            }
        };

        self.buf.extend_from_slice(packet);
        self.received += 1;

        if self.received < header.packet_count {
            return Ok(None);
        }

        // All declared packets arrived; extract the body.
        self.header = None;
        let end = RESPONSE_HEADER_LEN + header.body_size as usize;
        if self.buf.len() < end {
            // The packets cannot hold the declared body size.
            return Err(Error::MalformedHeader);
        }
        let body = self.buf[RESPONSE_HEADER_LEN..end].to_vec();
        Ok(Some(Response {
            function: header.function,
            status: header.status,
            body,
        }))
    }

    /// Discard any partial response (transport reconnect, timeout).
    pub fn reset(&mut self) {
        self.header = None;
        self.buf.clear();
        self.received = 0;
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}
