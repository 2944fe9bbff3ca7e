//! CAN controller lifecycle and request-dispatch engine.
//!
//! Owns global and per-controller runtime state, enforces the precondition
//! contract on every public operation, arbitrates transmit/abort/baudrate
//! requests, and drives the cyclic polling schedule across an arbitrary
//! number of controllers partitioned into polling groups.
//!
//! The engine talks downward through the [`candrv_common::hw::CanHardware`]
//! trait and upward through [`candrv_common::notify::CanListener`]; it never
//! touches registers and never blocks.
//!
//! # Module Structure
//!
//! - [`driver`] - The driver context and request dispatcher
//! - [`poller`] - Poll-group sweeps (transmit, receive, bus-off, wakeup, modes)
//! - [`registry`] - Per-controller status entries and the transmit ledger
//! - [`version`] - Driver identification

pub mod driver;
pub mod poller;
pub mod registry;
pub mod version;

mod validate;

pub use driver::{CanDriver, DriverCapabilities};
pub use version::{version_info, VersionInfo};
