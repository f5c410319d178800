//! Wire format: framing, headers, and reassembly.
//!
//! Everything little-endian.  Outbound requests are a single logical
//! message; the transport fragments them into link packets.  Inbound
//! responses arrive as `packetCount` link packets that the
//! [`Reassembler`](reassemble::Reassembler) stitches back together.
//!
//! ```text
//! Request  ─▶ [functionId:1][body...]
//!
//! Response ─▶ packet 1: [functionId:1][status:1][packetCount:2][bodySize:2][body...]
//!             packet 2..N: [body continuation...]
//!
//! Event    ─▶ single packet: [255][eventKind:1][payload...]
//! ```

pub mod bytes;
pub mod frame;
pub mod reassemble;

pub use bytes::{ByteReader, ByteWriter};
pub use frame::{
    ControllerEvent, EVENT_FUNCTION_ID, FunctionId, RESPONSE_HEADER_LEN, ResponseHeader,
};
pub use reassemble::{Reassembler, Response};
