//! Port types — the boundary between the core and the platform layer.
//!
//! ```text
//!   platform adapter ──▶ port type ──▶ core
//! ```
//!
//! The embedding application supplies the radio-availability signal and
//! the notice sink; the core supplies discovery and colour-library data
//! types the platform persists or renders.  None of these touch the
//! protocol itself.

use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::observe::StateCell;
use crate::props::{Argb, GroupId};

// ───────────────────────────────────────────────────────────────
// User notices
// ───────────────────────────────────────────────────────────────

/// Structured, localizable user-facing failure reports.
///
/// The core emits exactly one notice per failure — never one per retry —
/// through [`NoticeSink`].  The `Display` impl is the untranslated
/// fallback text.
#[derive(Debug, Clone)]
pub enum Notice {
    /// A user-initiated connect attempt failed.
    ConnectFailed { error: Error },
    /// Fetching a property group failed; its last-good list (or the
    /// loading placeholder) is still shown.
    SyncFailed { group: GroupId, error: Error },
    /// Automatic reconnection gave up after the configured attempts.
    ReconnectExhausted { attempts: u32 },
}

impl core::fmt::Display for Notice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectFailed { error } => write!(f, "could not connect: {error}"),
            Self::SyncFailed { group, error } => {
                write!(f, "failed to load {group:?} settings: {error}")
            }
            Self::ReconnectExhausted { attempts } => {
                write!(f, "connection lost; gave up after {attempts} attempts")
            }
        }
    }
}

/// Where user-facing notices go.  Adapters decide how to present them —
/// a toast, a banner, a log line.
pub trait NoticeSink: Send + Sync + 'static {
    fn notice(&self, notice: &Notice);
}

/// Sink that forwards every notice to the log.  The default when the
/// platform has nothing better.
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notice(&self, notice: &Notice) {
        warn!("NOTICE | {notice}");
    }
}

// ───────────────────────────────────────────────────────────────
// Connectivity signal
// ───────────────────────────────────────────────────────────────

/// Radio-availability signal fed by the platform (Bluetooth adapter
/// state on mobile).  The state driver waits on it before attempting
/// any connect.
#[derive(Clone)]
pub struct ConnectivityFeed {
    cell: Arc<StateCell<bool>>,
}

impl ConnectivityFeed {
    pub fn new(initially_available: bool) -> Self {
        Self {
            cell: Arc::new(StateCell::new(initially_available)),
        }
    }

    /// Report a change in radio availability.
    pub fn set(&self, available: bool) {
        self.cell.set_if_changed(available);
    }

    pub fn get(&self) -> bool {
        self.cell.get()
    }

    pub(crate) fn cell(&self) -> Arc<StateCell<bool>> {
        self.cell.clone()
    }
}

// ───────────────────────────────────────────────────────────────
// Peripheral discovery
// ───────────────────────────────────────────────────────────────

/// One peripheral seen during a platform scan.  The platform layer
/// produces these; picking one feeds its address to
/// [`ControllerClient::connect`](crate::client::ControllerClient::connect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub address: String,
    pub name: String,
}

// ───────────────────────────────────────────────────────────────
// Colour library snapshots
// ───────────────────────────────────────────────────────────────

/// The user's saved colours.  Storage is the platform's concern; this
/// type only defines the snapshot format it persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorLibrary {
    pub colors: Vec<Argb>,
}

impl ColorLibrary {
    /// Serialize for the platform's key-value store.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::InvalidValue("colour library encode"))
    }

    /// Deserialize a stored snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|_| Error::Decode {
            property: "colour library".into(),
            kind: "postcard",
        })
    }
}
