//! scenelink — host-side client core for scene controller peripherals.
//!
//! The crate builds a reliable, typed, bidirectional RPC channel on top of
//! a short-range wireless link whose lowest layer only delivers small,
//! unreliable, size-limited packets (BLE GATT write + notify in the
//! reference deployment), and keeps a locally cached set of remote
//! "properties" synchronized with the controller.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ControllerClient                         │
//! │                                                              │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────────────────┐  │
//! │  │ State      │  │ SyncEngine │  │ Session                │  │
//! │  │ driver     │─▶│ (property  │─▶│ (single-in-flight      │  │
//! │  │ (FSM)      │  │  groups)   │  │  request worker)       │  │
//! │  └────────────┘  └────────────┘  └───────────┬────────────┘  │
//! │         ▲               ▲                    │               │
//! │         │ events        │ resync   ┌─────────▼────────────┐  │
//! │         └───────────────┴──────────│ Reassembler / frames │  │
//! │                                    └─────────┬────────────┘  │
//! │                                    ┌─────────▼────────────┐  │
//! │                                    │ LinkTransport (trait)│  │
//! │                                    └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! UI layers consume the core through observable state cells
//! ([`observe::StateCell`]), imperative command calls on
//! [`client::ControllerClient`], and the structured notice sink in
//! [`ports`].

#![deny(unused_must_use)]

pub mod client;
pub mod config;
pub mod fsm;
pub mod observe;
pub mod ports;
pub mod props;
pub mod session;
pub mod transport;
pub mod wire;

mod error;

pub use client::ControllerClient;
pub use config::LinkConfig;
pub use error::{Error, Result};
