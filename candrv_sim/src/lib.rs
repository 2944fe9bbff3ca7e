//! Simulated CAN controller hardware.
//!
//! `SimHardware` implements the hardware-programming trait with
//! software-emulated controllers: bounded transmit mailboxes, injectable
//! receive frames, and scriptable bus-off/wakeup conditions. It backs the
//! engine's demo binary and provides a hardware-free environment for
//! development and testing.

pub mod controller;

pub use controller::{SimHardware, TX_SLOTS_PER_CONTROLLER};
