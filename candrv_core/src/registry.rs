//! Per-controller status entries and the transmit ledger.
//!
//! Both structures follow the same locking discipline: each mutex guards
//! exactly one read-modify-write and is never held across a call into the
//! hardware-programming collaborator.

use candrv_common::config::CanConfig;
use candrv_common::frame::{ControllerId, TxHandle};
use candrv_common::state::ControllerState;
use std::collections::HashSet;
use std::sync::Mutex;

// ─── Controller Status Registry ─────────────────────────────────────

/// Mutable runtime state of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerEntry {
    /// Current lifecycle state.
    pub state: ControllerState,
    /// Index into the controller's baudrate table.
    pub baudrate_index: usize,
}

/// Runtime status of all configured controllers.
///
/// Constructed once at init and owned by the driver context. Entries for
/// unconfigured slots exist but are never reached: the dispatcher's
/// controller gate rejects those ids first.
pub struct ControllerRegistry {
    entries: Vec<Mutex<ControllerEntry>>,
}

impl ControllerRegistry {
    /// Build the registry from a validated configuration: every controller
    /// starts Stopped at its descriptor's default baudrate entry.
    pub fn new(config: &CanConfig) -> Self {
        let entries = config
            .controllers
            .iter()
            .map(|desc| {
                Mutex::new(ControllerEntry {
                    state: ControllerState::Stopped,
                    baudrate_index: desc.default_baudrate_index,
                })
            })
            .collect();
        Self { entries }
    }

    /// Snapshot of one entry. Caller has validated `id`.
    pub fn entry(&self, id: ControllerId) -> ControllerEntry {
        *self.lock(id)
    }

    /// Current lifecycle state.
    pub fn state(&self, id: ControllerId) -> ControllerState {
        self.lock(id).state
    }

    /// Overwrite the lifecycle state.
    pub fn set_state(&self, id: ControllerId, state: ControllerState) {
        self.lock(id).state = state;
    }

    /// Active baudrate table index.
    pub fn baudrate_index(&self, id: ControllerId) -> usize {
        self.lock(id).baudrate_index
    }

    /// Record a newly activated baudrate table index.
    pub fn set_baudrate_index(&self, id: ControllerId, index: usize) {
        self.lock(id).baudrate_index = index;
    }

    fn lock(&self, id: ControllerId) -> std::sync::MutexGuard<'_, ControllerEntry> {
        self.entries[id as usize]
            .lock()
            .expect("controller entry lock poisoned")
    }
}

// ─── Transmit Ledger ────────────────────────────────────────────────

/// In-flight transmit markers, one per hardware transmit-handle.
///
/// A handle is claimed before the hardware write and stays claimed until
/// the transmission confirms, aborts, or the hardware rejects the request.
/// A second claim on an already claimed handle is the re-entrant case and
/// is refused without blocking.
#[derive(Debug, Default)]
pub struct TxLedger {
    pending: Mutex<HashSet<TxHandle>>,
}

impl TxLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a handle. Returns false if it is already in flight.
    pub fn try_claim(&self, hth: TxHandle) -> bool {
        self.pending
            .lock()
            .expect("transmit ledger lock poisoned")
            .insert(hth)
    }

    /// Release a handle. Idempotent.
    pub fn release(&self, hth: TxHandle) {
        self.pending
            .lock()
            .expect("transmit ledger lock poisoned")
            .remove(&hth);
    }

    /// Returns true if the handle has an in-flight request.
    pub fn is_pending(&self, hth: TxHandle) -> bool {
        self.pending
            .lock()
            .expect("transmit ledger lock poisoned")
            .contains(&hth)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
