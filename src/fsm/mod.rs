//! Application-level connection state machine.
//!
//! A pure transition function over plain state and input identifiers;
//! the driver in [`client`](crate::client) feeds it inputs and performs
//! the side effects (connect, sync, backoff, disconnect) that each state
//! implies.  Keeping the table pure makes every path unit-testable
//! without a transport.
//!
//! ```text
//!  WAITING ──[connectivity on]──▶ DISCONNECTED ──[device picked]──▶ CONNECTING
//!     ▲                                ▲                               │
//!     │[connectivity off]     [sync failed / user                 [connected]
//!     │                        disconnect / exhausted]                ▼
//!     ├────────────────────────────────┼──────────────────────── SYNCING
//!     │                                │                              │
//!     │                                │                          [synced]
//!     │                                │                              ▼
//!     └──[connectivity off]─── RECONNECTING ◀──[connection lost]── READY
//!                                      │
//!                               [connected] ──▶ SYNCING
//! ```
//!
//! There is no terminal state: the machine runs for the lifetime of the
//! process.

use serde::{Deserialize, Serialize};

/// Application-visible lifecycle of the controller link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationState {
    /// The platform radio is off; nothing can be attempted.
    WaitingForConnectivity,
    /// Radio available, no controller link.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Link up; the property groups are being fetched.
    Syncing,
    /// Link up and caches hydrated.
    Ready,
    /// Link lost from `Ready`; bounded automatic reconnects running.
    Reconnecting,
}

/// Session-level summary derived from [`ApplicationState`] for
/// consumers that only care about the device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    Disconnected,
    Connecting,
    Fetching,
    Ready,
}

/// Inputs fed to the machine by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    ConnectivityEnabled,
    ConnectivityDisabled,
    /// The user selected a peripheral to connect to.
    DevicePicked,
    /// The transport reports an established link.
    Connected,
    /// Clean link teardown: failed connect, user disconnect, or
    /// exhausted reconnect attempts.
    Disconnected,
    /// All property groups fetched.
    Synced,
    /// A group fetch failed while syncing.
    SyncFailed,
    /// The link dropped out from under a ready session.
    ConnectionLost,
}

/// The transition table.  `None` means the input is ignored in that
/// state.
pub fn transition(state: ApplicationState, input: Input) -> Option<ApplicationState> {
    use ApplicationState as S;
    use Input as I;

    match (state, input) {
        (S::WaitingForConnectivity, I::ConnectivityEnabled) => Some(S::Disconnected),

        (S::Disconnected, I::DevicePicked) => Some(S::Connecting),
        (S::Disconnected, I::ConnectivityDisabled) => Some(S::WaitingForConnectivity),

        (S::Connecting, I::Connected) => Some(S::Syncing),
        (S::Connecting, I::Disconnected | I::ConnectivityDisabled) => {
            Some(S::WaitingForConnectivity)
        }

        (S::Syncing, I::Synced) => Some(S::Ready),
        (S::Syncing, I::Disconnected | I::SyncFailed) => Some(S::Disconnected),
        (S::Syncing, I::ConnectivityDisabled) => Some(S::WaitingForConnectivity),

        (S::Ready, I::Disconnected) => Some(S::Disconnected),
        (S::Ready, I::ConnectivityDisabled | I::ConnectionLost) => Some(S::Reconnecting),

        (S::Reconnecting, I::Connected) => Some(S::Syncing),
        (S::Reconnecting, I::Disconnected) => Some(S::Disconnected),
        (S::Reconnecting, I::ConnectivityDisabled) => Some(S::WaitingForConnectivity),

        _ => None,
    }
}

/// Collapse the application state into the device-link summary.
pub fn device_state(state: ApplicationState) -> DeviceState {
    match state {
        ApplicationState::WaitingForConnectivity | ApplicationState::Disconnected => {
            DeviceState::Disconnected
        }
        ApplicationState::Connecting | ApplicationState::Reconnecting => DeviceState::Connecting,
        ApplicationState::Syncing => DeviceState::Fetching,
        ApplicationState::Ready => DeviceState::Ready,
    }
}
