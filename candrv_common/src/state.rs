//! Lifecycle state enums for the driver and its controllers.
//!
//! All enums use `#[repr(u8)]` for compact memory layout. The global
//! [`DriverState`] is a one-way gate (Uninitialized → Ready, latched by a
//! successful init). Per-controller state follows
//! Stopped ⇄ Started, Stopped → Sleep → Stopped, Started → BusOff → Stopped.

use serde::{Deserialize, Serialize};

// ─── Global Driver State ────────────────────────────────────────────

/// Process-wide driver status.
///
/// Set to `Ready` exactly once by a successful init call; never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DriverState {
    /// Created, no configuration bound yet.
    Uninitialized = 0,
    /// Configuration bound, controllers initialized.
    Ready = 1,
}

impl DriverState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninitialized),
            1 => Some(Self::Ready),
            _ => None,
        }
    }
}

impl Default for DriverState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

// ─── Per-Controller State ───────────────────────────────────────────

/// Per-controller lifecycle state.
///
/// After init every configured controller is `Stopped` with interrupts
/// disabled. `BusOff` is entered only by bus-off detection and exits only
/// via a Stop transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControllerState {
    /// Not participating on the bus; timing may be reprogrammed here.
    Stopped = 0,
    /// Active bus participation.
    Started = 1,
    /// Low-power state; leaves only via wakeup.
    Sleep = 2,
    /// Excessive transmission errors; recovery pending.
    BusOff = 3,
}

impl ControllerState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            1 => Some(Self::Started),
            2 => Some(Self::Sleep),
            3 => Some(Self::BusOff),
            _ => None,
        }
    }

    /// Returns true if the requested transition is legal from this state.
    ///
    /// Re-requesting the state the controller is already in is idempotent
    /// and allowed; all other edges outside the lifecycle graph are
    /// rejected by the dispatcher as an invalid transition.
    #[inline]
    pub const fn accepts(&self, transition: ControllerTransition) -> bool {
        use ControllerTransition::*;
        match (self, transition) {
            // Lifecycle graph edges.
            (Self::Stopped, Start)
            | (Self::Started, Stop)
            | (Self::Stopped, Sleep)
            | (Self::Sleep, Wakeup)
            | (Self::BusOff, Stop) => true,
            // Idempotent re-requests (target state already active).
            (Self::Started, Start)
            | (Self::Stopped, Stop)
            | (Self::Sleep, Sleep)
            | (Self::Stopped, Wakeup) => true,
            _ => false,
        }
    }

    /// Returns true if baudrate/timing reprogramming is permitted.
    #[inline]
    pub const fn allows_retiming(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::Stopped
    }
}

// ─── Mode Transition Requests ───────────────────────────────────────

/// Mode transition request values accepted by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ControllerTransition {
    /// Begin bus participation.
    Start = 0,
    /// Leave the bus (also the recovery exit from BusOff).
    Stop = 1,
    /// Enter the low-power state.
    Sleep = 2,
    /// Leave the low-power state.
    Wakeup = 3,
}

impl ControllerTransition {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Start),
            1 => Some(Self::Stop),
            2 => Some(Self::Sleep),
            3 => Some(Self::Wakeup),
            _ => None,
        }
    }

    /// The controller state reached when this transition completes.
    #[inline]
    pub const fn target(&self) -> ControllerState {
        match self {
            Self::Start => ControllerState::Started,
            Self::Stop => ControllerState::Stopped,
            Self::Sleep => ControllerState::Sleep,
            Self::Wakeup => ControllerState::Stopped,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
