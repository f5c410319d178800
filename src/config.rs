//! Link and session configuration.
//!
//! All tunable parameters for a controller session.  Values can be
//! overridden by the embedding application before the client is spawned.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::MAX_PACKET_LEN;

/// Core session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    // --- Link ---
    /// Link packet payload size in bytes.  20 for a bare BLE 4.x
    /// notification; larger when the transport negotiates a bigger MTU.
    pub packet_size: usize,

    // --- Session ---
    /// Upper bound on one request/response round-trip, including
    /// multi-packet response reassembly (milliseconds).
    pub request_timeout_ms: u32,

    // --- Reconnection ---
    /// How many times the state driver retries `connect()` after a
    /// connection loss before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts (milliseconds).
    pub reconnect_delay_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            packet_size: 20,
            request_timeout_ms: 30_000,
            reconnect_attempts: 10,
            reconnect_delay_ms: 3_000,
        }
    }
}

impl LinkConfig {
    /// Request round-trip budget as a timer duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.request_timeout_ms))
    }

    /// Delay between reconnect attempts as a timer duration.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.reconnect_delay_ms))
    }

    /// Reject configurations the wire format cannot carry.
    pub fn validate(&self) -> Result<()> {
        // A packet must at least hold the response header plus one byte.
        if self.packet_size < 8 || self.packet_size > MAX_PACKET_LEN {
            return Err(Error::InvalidValue("packet_size out of range"));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidValue("request_timeout_ms must be nonzero"));
        }
        Ok(())
    }
}
