//! Dispatch error taxonomy and hardware fault types.
//!
//! Every public operation of the engine detects precondition violations
//! locally, reports them through the fault-reporting side channel, and
//! returns the matching [`DispatchError`] without touching hardware.
//! Hardware faults are wrapped verbatim, never reinterpreted.

use crate::frame::ControllerId;
use crate::state::{ControllerState, ControllerTransition};
use thiserror::Error;

/// Error types surfaced by the request dispatcher and poller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Operation requires the driver to be initialized.
    #[error("driver not initialized")]
    Uninitialized,

    /// Init called while the driver is already Ready.
    #[error("driver already initialized")]
    AlreadyInitialized,

    /// Controller id out of range, or the descriptor slot is unconfigured.
    #[error("invalid controller id {0}")]
    InvalidController(ControllerId),

    /// The controller's current state does not permit the request.
    #[error("{operation} not permitted in state {current:?}")]
    InvalidTransition {
        /// Controller state at the time of the request.
        current: ControllerState,
        /// The rejected request.
        operation: RejectedRequest,
    },

    /// No baudrate table entry matches the requested rate or identifier.
    #[error("no baudrate table entry matches {0}")]
    InvalidBaudrate(u32),

    /// No ICOM table entry matches the requested configuration id.
    #[error("no ICOM table entry matches configuration id {0}")]
    InvalidIcomConfig(u16),

    /// Transmit PDU carries no payload and trigger-transmit is not enabled.
    #[error("transmit PDU carries no payload data")]
    MissingPayload,

    /// Supplied configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The driver was built without the capability for this operation.
    #[error("operation not supported by this driver build")]
    Unsupported,

    /// Hardware-programming failure, passed through unreinterpreted.
    #[error("hardware fault: {0}")]
    Hardware(#[from] HwFault),
}

/// The request that an `InvalidTransition` rejection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedRequest {
    /// A mode transition request.
    Mode(ControllerTransition),
    /// A baudrate/timing change.
    Retiming,
}

impl std::fmt::Display for RejectedRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mode(t) => write!(f, "{t:?} transition"),
            Self::Retiming => write!(f, "baudrate change"),
        }
    }
}

/// Failures reported by the hardware-programming collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HwFault {
    /// Controller (re-)initialization failed.
    #[error("controller initialization failed: {0}")]
    InitFailed(String),

    /// Mode transition could not be programmed.
    #[error("mode change failed: {0}")]
    ModeChangeFailed(String),

    /// Mailbox programming or validation failed.
    #[error("transmit failed: {0}")]
    TransmitFailed(String),

    /// ICOM configuration could not be programmed.
    #[error("ICOM programming failed: {0}")]
    IcomFailed(String),
}

/// Public operations, named for fault reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceId {
    Init = 0,
    SetControllerMode = 1,
    EnableInterrupts = 2,
    DisableInterrupts = 3,
    Write = 4,
    AbortTransmit = 5,
    ChangeBaudrate = 6,
    CheckBaudrate = 7,
    SetBaudrate = 8,
    SetIcomConfiguration = 9,
    CheckWakeup = 10,
    PollTransmit = 11,
    PollReceive = 12,
    PollBusOff = 13,
    PollWakeup = 14,
    PollModes = 15,
    GetControllerState = 16,
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_error_display() {
        let err = DispatchError::InvalidController(3);
        assert!(err.to_string().contains("3"));

        let err = DispatchError::InvalidTransition {
            current: ControllerState::Started,
            operation: RejectedRequest::Retiming,
        };
        let msg = err.to_string();
        assert!(msg.contains("baudrate change"));
        assert!(msg.contains("Started"));

        let err = DispatchError::InvalidTransition {
            current: ControllerState::Sleep,
            operation: RejectedRequest::Mode(ControllerTransition::Start),
        };
        assert!(err.to_string().contains("Start"));
    }

    #[test]
    fn hw_fault_wraps_into_dispatch_error() {
        let fault = HwFault::TransmitFailed("mailbox parity".to_string());
        let err: DispatchError = fault.clone().into();
        assert_eq!(err, DispatchError::Hardware(fault));
        assert!(err.to_string().contains("mailbox parity"));
    }

    #[test]
    fn invalid_baudrate_display() {
        let err = DispatchError::InvalidBaudrate(500);
        assert!(err.to_string().contains("500"));
    }
}
