//! Common re-exports for convenience.

pub use crate::config::{
    BaudrateEntry, CanConfig, ConfigError, ConfigLoader, ControllerDescriptor, IcomEntry,
    NO_HW_OFFSET,
};
pub use crate::error::{DispatchError, HwFault, RejectedRequest, ServiceId};
pub use crate::frame::{
    CanId, ControllerId, PduId, Payload, RxFrame, TxHandle, TxPdu, WakeupSourceId, MAX_DATA_LEN,
};
pub use crate::hw::{CanHardware, TxCompletion, WriteOutcome};
pub use crate::notify::{
    CanListener, FaultReporter, IcomOutcome, NopListener, TracingReporter, WakeupSink,
};
pub use crate::state::{ControllerState, ControllerTransition, DriverState};
