//! CAN identifiers, received frames and transmit PDUs.
//!
//! Payload buffers are fixed-capacity `heapless::Vec` so the transmit and
//! receive paths carry no heap allocation.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Controller identifier - index into the descriptor/status tables.
pub type ControllerId = u8;

/// Opaque hardware transmit-handle (mailbox address).
pub type TxHandle = u16;

/// Upper-layer PDU handle, echoed back in transmit confirmations.
pub type PduId = u16;

/// Wakeup source identifier reported to the power-management collaborator.
pub type WakeupSourceId = u8;

/// Maximum payload length in bytes (CAN FD).
pub const MAX_DATA_LEN: usize = 64;

// Classic CAN hardware truncates at 8; the FD bound is the hard ceiling.
const_assert!(MAX_DATA_LEN <= 64);

/// Fixed-capacity payload buffer.
pub type Payload = heapless::Vec<u8, MAX_DATA_LEN>;

// ─── CAN Identifier ─────────────────────────────────────────────────

/// CAN message identifier, standard (11-bit) or extended (29-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanId {
    raw: u32,
    extended: bool,
}

/// Highest valid standard identifier.
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Highest valid extended identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

impl CanId {
    /// Create a standard (11-bit) identifier. Returns `None` if out of range.
    #[inline]
    pub const fn standard(raw: u32) -> Option<Self> {
        if raw <= MAX_STANDARD_ID {
            Some(Self {
                raw,
                extended: false,
            })
        } else {
            None
        }
    }

    /// Create an extended (29-bit) identifier. Returns `None` if out of range.
    #[inline]
    pub const fn extended(raw: u32) -> Option<Self> {
        if raw <= MAX_EXTENDED_ID {
            Some(Self {
                raw,
                extended: true,
            })
        } else {
            None
        }
    }

    /// Raw identifier value.
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// Returns true for extended-format identifiers.
    #[inline]
    pub const fn is_extended(&self) -> bool {
        self.extended
    }
}

// ─── Received Frame ─────────────────────────────────────────────────

/// One received CAN frame, as handed to the reception indication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    /// Message identifier.
    pub id: CanId,
    /// Payload bytes.
    pub data: Payload,
}

impl RxFrame {
    /// Build a frame from a byte slice. Returns `None` if the slice
    /// exceeds [`MAX_DATA_LEN`].
    pub fn from_slice(id: CanId, bytes: &[u8]) -> Option<Self> {
        let mut data = Payload::new();
        data.extend_from_slice(bytes).ok()?;
        Some(Self { id, data })
    }
}

// ─── Transmit PDU ───────────────────────────────────────────────────

/// Transmit request descriptor handed to `write`.
///
/// `sdu` may be `None` only when the driver carries the trigger-transmit
/// capability; the hardware layer then fetches the data lazily at mailbox
/// load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPdu {
    /// Upper-layer PDU handle, echoed in the transmit confirmation.
    pub pdu: PduId,
    /// Hardware transmit-handle this request is addressed to.
    pub hth: TxHandle,
    /// Message identifier.
    pub id: CanId,
    /// Payload length in bytes.
    pub dlc: u8,
    /// Payload bytes, or `None` for deferred (trigger-transmit) data.
    pub sdu: Option<Payload>,
}

impl TxPdu {
    /// Build a transmit PDU with inline payload data.
    ///
    /// Returns `None` if the slice exceeds [`MAX_DATA_LEN`].
    pub fn with_data(pdu: PduId, hth: TxHandle, id: CanId, bytes: &[u8]) -> Option<Self> {
        let mut sdu = Payload::new();
        sdu.extend_from_slice(bytes).ok()?;
        Some(Self {
            pdu,
            hth,
            id,
            dlc: bytes.len() as u8,
            sdu: Some(sdu),
        })
    }

    /// Build a transmit PDU with deferred (trigger-transmit) payload.
    pub const fn deferred(pdu: PduId, hth: TxHandle, id: CanId, dlc: u8) -> Self {
        Self {
            pdu,
            hth,
            id,
            dlc,
            sdu: None,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
