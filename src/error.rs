//! Unified error types for the scenelink core.
//!
//! A single `Error` enum that every layer funnels into, keeping the
//! client's error handling uniform: the transport, the wire parsers, the
//! session, and the sync engine all fail with the same type.  Variants
//! are `Clone` so one failure can both complete a pending request and be
//! reported to the notice sink.

use core::fmt;

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The underlying radio is off or the platform refused the link.
    TransportUnavailable,
    /// The peer is reachable but does not expose the expected
    /// service/characteristics.
    PeerNotFound,
    /// A bounded wait (connect, request, reassembly) elapsed.
    Timeout,
    /// A multi-packet response was cut short: fewer packets arrived than
    /// the header declared before the timeout.
    PacketLoss { received: u16, expected: u16 },
    /// The first packet of a response was too short to hold the header,
    /// or the header's declared sizes are inconsistent with the data.
    MalformedHeader,
    /// A property descriptor or value could not be decoded.  Carries the
    /// property name (empty when it is not yet known) and a kind label
    /// for diagnostics.
    Decode {
        property: String,
        kind: &'static str,
    },
    /// The wire carried a property kind tag outside the known catalog.
    UnsupportedKind(u8),
    /// A request that expected a response never received one.
    NoResponse,
    /// The operation requires a connected transport.
    NotConnected,
    /// The controller answered with a nonzero status byte; the message is
    /// the UTF-8 body it sent along.
    Remote { status: u8, message: String },
    /// A locally supplied value does not fit the target property
    /// (kind mismatch, unknown id, or a non-writable placeholder).
    InvalidValue(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportUnavailable => write!(f, "transport unavailable"),
            Self::PeerNotFound => write!(f, "peer service not found"),
            Self::Timeout => write!(f, "timed out"),
            Self::PacketLoss { received, expected } => {
                write!(f, "packet loss: {received}/{expected} packets received")
            }
            Self::MalformedHeader => write!(f, "malformed response header"),
            Self::Decode { property, kind } => {
                if property.is_empty() {
                    write!(f, "decode failed ({kind})")
                } else {
                    write!(f, "decode failed for '{property}' ({kind})")
                }
            }
            Self::UnsupportedKind(raw) => write!(f, "unsupported property kind {raw}"),
            Self::NoResponse => write!(f, "no response from controller"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Remote { status, message } => {
                write!(f, "controller error {status}: {message}")
            }
            Self::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
