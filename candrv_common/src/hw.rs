//! Hardware-programming collaborator trait.
//!
//! This module defines:
//! - `CanHardware` trait - Interface to the register-programming layer
//! - `WriteOutcome` enum - Three-valued transmit request result (with the
//!   fault arm carried in `Result::Err`)
//! - `TxCompletion` struct - One completed hardware transmission

use crate::config::{BaudrateEntry, ControllerDescriptor, IcomEntry};
use crate::error::HwFault;
use crate::frame::{ControllerId, PduId, RxFrame, TxHandle, TxPdu};
use crate::state::ControllerTransition;

/// Result of a transmit request accepted by the hardware layer.
///
/// The third outcome of a transmit request (a validation or hardware
/// fault) travels as `Err(HwFault)`; the engine preserves all three
/// verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Frame queued into a free hardware transmit slot.
    Accepted,
    /// No free slot, or the request lost to a higher-priority pending one.
    Busy,
}

/// One completed transmission, drained by transmit polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxCompletion {
    /// Hardware transmit-handle that finished.
    pub hth: TxHandle,
    /// Upper-layer PDU handle to confirm.
    pub pdu: PduId,
}

/// Interface to the hardware-programming layer.
///
/// The engine manages controller lifecycle and request dispatch through
/// this trait; implementations own all register access, bit-timing
/// arithmetic and interrupt-flag handling.
///
/// # Contract
///
/// Every method is synchronous and non-blocking: it returns a definite
/// result immediately, never "pending". Implementations must be callable
/// from both the synchronous request path and periodic poll contexts
/// (`Send + Sync`). The engine never holds one of its internal locks
/// across a call into this trait.
pub trait CanHardware: Send + Sync {
    /// One-time global initialization, before any controller is touched.
    fn init_variables(&self);

    /// Program a controller with the given timing entry and leave it
    /// stopped. Also used to re-apply timing on baudrate changes.
    fn init_controller(
        &self,
        id: ControllerId,
        desc: &ControllerDescriptor,
        baudrate: &BaudrateEntry,
    ) -> Result<(), HwFault>;

    /// Execute a mode transition on the controller hardware.
    fn set_mode(
        &self,
        id: ControllerId,
        desc: &ControllerDescriptor,
        transition: ControllerTransition,
    ) -> Result<(), HwFault>;

    /// Unmask the controller's interrupt sources.
    fn enable_interrupts(&self, id: ControllerId, desc: &ControllerDescriptor);

    /// Mask the controller's interrupt sources.
    fn disable_interrupts(&self, id: ControllerId);

    /// Load a transmit request into the mailbox addressed by `hth`.
    ///
    /// Must not block: a full mailbox set or a higher-priority pending
    /// request yields `Ok(Busy)` (in the preemption case the displaced
    /// request is cancelled asynchronously by the hardware layer).
    fn write(&self, hth: TxHandle, pdu: &TxPdu) -> Result<WriteOutcome, HwFault>;

    /// Cancel any transmission pending on `hth`. Idempotent.
    fn abort_transmit(&self, hth: TxHandle);

    /// Drain completed transmissions for one controller.
    fn poll_transmit(&self, id: ControllerId) -> Vec<TxCompletion>;

    /// Drain newly received frames for one controller.
    fn poll_receive(&self, id: ControllerId) -> Vec<RxFrame>;

    /// Returns true if the controller's bus-off flag is set.
    fn check_bus_off(&self, id: ControllerId) -> bool;

    /// Run bus-off recovery processing (flag acknowledgement etc.).
    fn process_bus_off(&self, id: ControllerId);

    /// Returns true if a wakeup event is latched for the controller.
    fn check_wakeup(&self, id: ControllerId) -> bool;

    /// Complete hardware-level wakeup processing.
    fn process_wakeup(&self, id: ControllerId);

    /// Hardware-specific state-refresh pass over all controllers.
    fn refresh_modes(&self);

    /// Program a Pretended-Networking configuration.
    fn set_icom(&self, id: ControllerId, entry: &IcomEntry) -> Result<(), HwFault>;

    /// Deactivate Pretended Networking on the controller.
    fn deactivate_icom(&self, id: ControllerId) -> Result<(), HwFault>;
}
