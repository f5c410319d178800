//! Frame layout: function ids, response headers, event frames.

use log::warn;

use crate::error::{Error, Result};
use crate::props::GroupId;

use super::bytes::ByteWriter;

/// Function id reserved for unsolicited event frames.
pub const EVENT_FUNCTION_ID: u8 = 255;

/// Size of the response header carried by the first packet.
pub const RESPONSE_HEADER_LEN: usize = 6;

/// Operations the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FunctionId {
    GetPropertyInfoById = 0,
    GetPropertyValueById = 1,
    GetPropertiesIdsByGroup = 2,
    GetPropertyById = 3,
    SetPropertyValueById = 4,
    GetPropertiesFromGroup = 5,
    Ping = 6,
}

impl FunctionId {
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::GetPropertyInfoById),
            1 => Some(Self::GetPropertyValueById),
            2 => Some(Self::GetPropertiesIdsByGroup),
            3 => Some(Self::GetPropertyById),
            4 => Some(Self::SetPropertyValueById),
            5 => Some(Self::GetPropertiesFromGroup),
            6 => Some(Self::Ping),
            _ => None,
        }
    }
}

/// Header carried by the first packet of every response.
///
/// `[functionId:1][status:1][packetCount:2][bodySize:2]`, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub function: u8,
    pub status: u8,
    pub packet_count: u16,
    pub body_size: u16,
}

impl ResponseHeader {
    /// Parse the header from the first packet of a response.
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if packet.len() < RESPONSE_HEADER_LEN {
            return Err(Error::MalformedHeader);
        }
        let header = Self {
            function: packet[0],
            status: packet[1],
            packet_count: u16::from_le_bytes([packet[2], packet[3]]),
            body_size: u16::from_le_bytes([packet[4], packet[5]]),
        };
        // A response always spans at least its own first packet.
        if header.packet_count == 0 {
            return Err(Error::MalformedHeader);
        }
        Ok(header)
    }

    pub fn encode(&self) -> [u8; RESPONSE_HEADER_LEN] {
        let count = self.packet_count.to_le_bytes();
        let size = self.body_size.to_le_bytes();
        [
            self.function,
            self.status,
            count[0],
            count[1],
            size[0],
            size[1],
        ]
    }
}

/// Build one outbound request message: `[functionId][body...]`.
///
/// The transport is responsible for splitting the message into link
/// packets; this layer never fragments writes.
pub fn build_request(function: FunctionId, write_body: impl FnOnce(&mut ByteWriter)) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.put_u8(function as u8);
    write_body(&mut w);
    w.into_inner()
}

/// Split a complete response (header + body) into link packets of
/// `packet_size` bytes.  The inverse of reassembly; used by simulated
/// peers and tests.
pub fn encode_response(function: u8, status: u8, body: &[u8], packet_size: usize) -> Vec<Vec<u8>> {
    let total = RESPONSE_HEADER_LEN + body.len();
    let packet_count = total.div_ceil(packet_size).max(1) as u16;
    let header = ResponseHeader {
        function,
        status,
        packet_count,
        body_size: body.len() as u16,
    };
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    buf.chunks(packet_size).map(<[u8]>::to_vec).collect()
}

/// Unsolicited notifications pushed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// The properties in `group` changed server-side; the cached list
    /// must be refetched.
    PropertiesChanged(GroupId),
}

/// Whether a packet is an event frame (single-packet, never reassembled).
pub fn is_event(packet: &[u8]) -> bool {
    packet.first() == Some(&EVENT_FUNCTION_ID)
}

/// Parse a single-packet event frame: `[255][eventKind:1][payload...]`.
pub fn parse_event(packet: &[u8]) -> Result<ControllerEvent> {
    if packet.len() < 2 || packet[0] != EVENT_FUNCTION_ID {
        return Err(Error::Decode {
            property: String::new(),
            kind: "event-frame",
        });
    }
    match packet[1] {
        0 => {
            let raw_group = *packet.get(2).ok_or(Error::Decode {
                property: String::new(),
                kind: "event-frame",
            })?;
            let group = GroupId::from_wire(raw_group).ok_or_else(|| {
                warn!("event for unknown group {raw_group}");
                Error::Decode {
                    property: String::new(),
                    kind: "event-group",
                }
            })?;
            Ok(ControllerEvent::PropertiesChanged(group))
        }
        kind => {
            warn!("unknown event kind {kind}");
            Err(Error::Decode {
                property: String::new(),
                kind: "event-kind",
            })
        }
    }
}
