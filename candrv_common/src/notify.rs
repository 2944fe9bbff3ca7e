//! Upstream notification and fault-reporting traits.
//!
//! All calls through these traits are one-way and must not block; the
//! engine invokes them from both the synchronous request path and poll
//! contexts.

use crate::error::{DispatchError, ServiceId};
use crate::frame::{ControllerId, PduId, RxFrame, WakeupSourceId};
use crate::state::ControllerState;
use tracing::warn;

/// Outcome reported by the unconditional ICOM result notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcomOutcome {
    /// The requested configuration was applied (or deactivated).
    Applied,
    /// The request was rejected or hardware programming failed.
    Failed,
}

/// Upstream notification consumer (the networking-interface layer).
pub trait CanListener: Send + Sync {
    /// A transmit request completed on the bus.
    fn tx_confirmation(&self, pdu: PduId);

    /// A frame arrived on the given controller.
    fn rx_indication(&self, controller: ControllerId, frame: &RxFrame);

    /// The controller entered bus-off; its state is already Stopped when
    /// this fires.
    fn bus_off(&self, controller: ControllerId);

    /// An explicitly requested mode transition completed.
    fn mode_indication(&self, controller: ControllerId, state: ControllerState);

    /// Result of an ICOM configuration request. Raised on every request
    /// that reached a valid controller, independent of the returned result.
    fn icom_result(&self, controller: ControllerId, config_id: u16, outcome: IcomOutcome);
}

/// Power-management collaborator recording detected wakeup sources.
pub trait WakeupSink: Send + Sync {
    /// A wakeup event was detected for the given source.
    fn wakeup_detected(&self, controller: ControllerId, source: WakeupSourceId);
}

/// Side channel for precondition violations.
///
/// Reporting never alters control flow beyond the dispatcher's early
/// return; implementations must not block.
pub trait FaultReporter: Send + Sync {
    /// Record one detected violation.
    fn report(&self, service: ServiceId, error: &DispatchError);
}

// ─── Default Implementations ────────────────────────────────────────

/// Fault reporter logging through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FaultReporter for TracingReporter {
    fn report(&self, service: ServiceId, error: &DispatchError) {
        warn!("{service:?} rejected: {error}");
    }
}

/// Listener discarding every notification. Useful for tests and tools
/// that only exercise the request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopListener;

impl CanListener for NopListener {
    fn tx_confirmation(&self, _pdu: PduId) {}
    fn rx_indication(&self, _controller: ControllerId, _frame: &RxFrame) {}
    fn bus_off(&self, _controller: ControllerId) {}
    fn mode_indication(&self, _controller: ControllerId, _state: ControllerState) {}
    fn icom_result(&self, _controller: ControllerId, _config_id: u16, _outcome: IcomOutcome) {}
}

impl WakeupSink for NopListener {
    fn wakeup_detected(&self, _controller: ControllerId, _source: WakeupSourceId) {}
}
