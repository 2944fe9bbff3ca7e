//! Driver context and request dispatcher.
//!
//! [`CanDriver`] is the explicit context object owning the collaborator
//! handles, the capability set, and the once-bound configuration/registry
//! pair. Every public operation validates its preconditions through the
//! combinators in `validate.rs`, reports violations through the fault
//! side channel, and only then touches hardware.

use crate::registry::{ControllerRegistry, TxLedger};
use crate::version::{version_info, VersionInfo};
use bitflags::bitflags;
use candrv_common::config::{CanConfig, ControllerDescriptor};
use candrv_common::error::{DispatchError, RejectedRequest, ServiceId};
use candrv_common::frame::{ControllerId, TxHandle, TxPdu};
use candrv_common::hw::{CanHardware, WriteOutcome};
use candrv_common::notify::{CanListener, FaultReporter, IcomOutcome, WakeupSink};
use candrv_common::state::{ControllerState, ControllerTransition, DriverState};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

bitflags! {
    /// Optional request-surface groups selected at construction.
    ///
    /// An operation whose flag is absent fails `Unsupported`; the
    /// contracts of the remaining operations are unaffected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriverCapabilities: u8 {
        /// `abort_transmit`
        const TX_ABORT         = 0x01;
        /// `change_baudrate` / `check_baudrate`
        const BAUDRATE_CHANGE  = 0x02;
        /// `set_baudrate` (identifier-based selection)
        const BAUDRATE_SELECT  = 0x04;
        /// `set_icom_configuration`
        const ICOM             = 0x08;
        /// `check_wakeup`
        const WAKEUP_CHECK     = 0x10;
        /// Transmit PDUs may defer payload data to mailbox load time.
        const TRIGGER_TRANSMIT = 0x20;
    }
}

impl Default for DriverCapabilities {
    fn default() -> Self {
        Self::empty()
    }
}

/// Configuration and runtime state bound by a successful init.
pub(crate) struct Bound {
    pub(crate) config: CanConfig,
    pub(crate) registry: ControllerRegistry,
    pub(crate) ledger: TxLedger,
}

impl Bound {
    /// Configured controllers assigned to the given polling group.
    pub(crate) fn group_members(
        &self,
        group: u8,
    ) -> impl Iterator<Item = (ControllerId, &ControllerDescriptor)> {
        self.config
            .controllers
            .iter()
            .enumerate()
            .filter(move |(_, d)| d.is_configured() && d.poll_group == group)
            .map(|(i, d)| (i as ControllerId, d))
    }
}

/// The CAN driver instance.
///
/// Constructed with its collaborators, then armed by [`CanDriver::init`].
/// All methods take `&self`: the synchronous request path and the poll
/// entry points may run from different execution contexts, and every
/// shared entry sits behind its own short-lived lock.
pub struct CanDriver {
    pub(crate) hw: Arc<dyn CanHardware>,
    pub(crate) listener: Arc<dyn CanListener>,
    pub(crate) wakeup: Arc<dyn WakeupSink>,
    pub(crate) reporter: Arc<dyn FaultReporter>,
    pub(crate) caps: DriverCapabilities,
    pub(crate) bound: OnceLock<Bound>,
}

impl CanDriver {
    /// Create an uninitialized driver with the given collaborators.
    pub fn new(
        hw: Arc<dyn CanHardware>,
        listener: Arc<dyn CanListener>,
        wakeup: Arc<dyn WakeupSink>,
        reporter: Arc<dyn FaultReporter>,
        caps: DriverCapabilities,
    ) -> Self {
        Self {
            hw,
            listener,
            wakeup,
            reporter,
            caps,
            bound: OnceLock::new(),
        }
    }

    /// Global driver status.
    #[inline]
    pub fn driver_state(&self) -> DriverState {
        if self.bound.get().is_some() {
            DriverState::Ready
        } else {
            DriverState::Uninitialized
        }
    }

    /// Driver identification.
    pub fn version_info(&self) -> VersionInfo {
        version_info()
    }

    // ─── Init ───────────────────────────────────────────────────────

    /// Bind a validated configuration and initialize every configured
    /// controller.
    ///
    /// Fails `AlreadyInitialized` once Ready (the first init's state is
    /// untouched) and `InvalidConfig` if validation rejects the supplied
    /// tables. On success all configured controllers are Stopped with
    /// interrupts disabled and the driver is Ready.
    pub fn init(&self, config: CanConfig) -> Result<(), DispatchError> {
        if self.bound.get().is_some() {
            return Err(self.reject(ServiceId::Init, DispatchError::AlreadyInitialized));
        }
        if let Err(e) = config.validate() {
            return Err(self.reject(ServiceId::Init, DispatchError::InvalidConfig(e.to_string())));
        }

        self.hw.init_variables();
        for (i, desc) in config.controllers.iter().enumerate() {
            if !desc.is_configured() {
                debug!("controller {i}: slot unconfigured, skipped");
                continue;
            }
            let id = i as ControllerId;
            let baudrate = desc.default_baudrate().ok_or_else(|| {
                self.reject(
                    ServiceId::Init,
                    DispatchError::InvalidConfig(format!(
                        "controller {i}: default baudrate index out of range"
                    )),
                )
            })?;
            self.hw.init_controller(id, desc, baudrate)?;
            self.hw.disable_interrupts(id);
            debug!(
                "controller {id}: initialized at {} kbit/s, interrupts masked",
                baudrate.bitrate_kbps
            );
        }

        let registry = ControllerRegistry::new(&config);
        let controllers = config.configured_ids().count();
        let bound = Bound {
            config,
            registry,
            ledger: TxLedger::new(),
        };
        if self.bound.set(bound).is_err() {
            // A concurrent init won the bind.
            return Err(self.reject(ServiceId::Init, DispatchError::AlreadyInitialized));
        }
        info!("driver ready, {controllers} controller(s) configured");
        Ok(())
    }

    // ─── Controller Mode ────────────────────────────────────────────

    /// Request a controller mode transition.
    ///
    /// Illegal edges fail `InvalidTransition` with no state change; legal
    /// requests are delegated to hardware, mirrored into the registry and
    /// announced through `mode_indication`.
    pub fn set_controller_mode(
        &self,
        id: ControllerId,
        transition: ControllerTransition,
    ) -> Result<(), DispatchError> {
        let (bound, desc) = self.guard_controller(ServiceId::SetControllerMode, id)?;

        let current = bound.registry.state(id);
        if !current.accepts(transition) {
            return Err(self.reject(
                ServiceId::SetControllerMode,
                DispatchError::InvalidTransition {
                    current,
                    operation: RejectedRequest::Mode(transition),
                },
            ));
        }

        self.hw.set_mode(id, desc, transition)?;
        let target = transition.target();
        bound.registry.set_state(id, target);
        debug!("controller {id}: {current:?} -> {target:?} ({transition:?})");
        self.listener.mode_indication(id, target);
        Ok(())
    }

    /// Current lifecycle state of a controller.
    pub fn controller_state(&self, id: ControllerId) -> Result<ControllerState, DispatchError> {
        let (bound, _) = self.guard_controller(ServiceId::GetControllerState, id)?;
        Ok(bound.registry.state(id))
    }

    /// Unmask the controller's interrupt sources.
    pub fn enable_interrupts(&self, id: ControllerId) -> Result<(), DispatchError> {
        let (_, desc) = self.guard_controller(ServiceId::EnableInterrupts, id)?;
        self.hw.enable_interrupts(id, desc);
        Ok(())
    }

    /// Mask the controller's interrupt sources.
    pub fn disable_interrupts(&self, id: ControllerId) -> Result<(), DispatchError> {
        self.guard_controller(ServiceId::DisableInterrupts, id)?;
        self.hw.disable_interrupts(id);
        Ok(())
    }

    // ─── Transmit Path ──────────────────────────────────────────────

    /// Dispatch a transmit request.
    ///
    /// Never blocks. The hardware's three outcomes are preserved verbatim:
    /// `Ok(Accepted)`, `Ok(Busy)`, or `Err(Hardware)`. A second request on
    /// a handle that is still in flight is Busy without a hardware call.
    pub fn write(&self, pdu: &TxPdu) -> Result<WriteOutcome, DispatchError> {
        let bound = self.guard(ServiceId::Write)?;

        if pdu.sdu.is_none() && !self.caps.contains(DriverCapabilities::TRIGGER_TRANSMIT) {
            return Err(self.reject(ServiceId::Write, DispatchError::MissingPayload));
        }

        // Claim before the hardware call; the claim is the re-entrancy
        // detector and must not be held open on rejection.
        if !bound.ledger.try_claim(pdu.hth) {
            debug!("hth {}: request already in flight, busy", pdu.hth);
            return Ok(WriteOutcome::Busy);
        }

        match self.hw.write(pdu.hth, pdu) {
            Ok(WriteOutcome::Accepted) => Ok(WriteOutcome::Accepted),
            Ok(WriteOutcome::Busy) => {
                bound.ledger.release(pdu.hth);
                Ok(WriteOutcome::Busy)
            }
            Err(fault) => {
                bound.ledger.release(pdu.hth);
                Err(DispatchError::Hardware(fault))
            }
        }
    }

    /// Abort any transmission pending on the given handle. Idempotent.
    pub fn abort_transmit(&self, hth: TxHandle) -> Result<(), DispatchError> {
        self.require(ServiceId::AbortTransmit, DriverCapabilities::TX_ABORT)?;
        let bound = self.guard(ServiceId::AbortTransmit)?;
        self.hw.abort_transmit(hth);
        bound.ledger.release(hth);
        Ok(())
    }

    // ─── Baudrate Management ────────────────────────────────────────

    /// Pure lookup: the table index a matching `change_baudrate` would
    /// activate. Mutates nothing.
    pub fn check_baudrate(
        &self,
        id: ControllerId,
        bitrate_kbps: u32,
    ) -> Result<usize, DispatchError> {
        self.require(ServiceId::CheckBaudrate, DriverCapabilities::BAUDRATE_CHANGE)?;
        let (_, desc) = self.guard_controller(ServiceId::CheckBaudrate, id)?;
        self.find_rate(ServiceId::CheckBaudrate, desc, bitrate_kbps)
    }

    /// Activate the baudrate table entry matching the requested bit-rate.
    ///
    /// Requires a Stopped controller; in-flight frames on a running
    /// controller would be corrupted by retiming. The active index is
    /// recorded only after the hardware accepts the new timing.
    pub fn change_baudrate(
        &self,
        id: ControllerId,
        bitrate_kbps: u32,
    ) -> Result<(), DispatchError> {
        self.require(ServiceId::ChangeBaudrate, DriverCapabilities::BAUDRATE_CHANGE)?;
        let (bound, desc) = self.guard_controller(ServiceId::ChangeBaudrate, id)?;
        let index = self.retiming_index(ServiceId::ChangeBaudrate, bound, desc, id, |e| {
            e.bitrate_kbps == bitrate_kbps
        })?;
        let found = index.ok_or_else(|| {
            self.reject(
                ServiceId::ChangeBaudrate,
                DispatchError::InvalidBaudrate(bitrate_kbps),
            )
        })?;
        self.apply_baudrate(bound, desc, id, found)
    }

    /// Activate the baudrate table entry with the requested identifier.
    pub fn set_baudrate(&self, id: ControllerId, config_id: u16) -> Result<(), DispatchError> {
        self.require(ServiceId::SetBaudrate, DriverCapabilities::BAUDRATE_SELECT)?;
        let (bound, desc) = self.guard_controller(ServiceId::SetBaudrate, id)?;
        let index = self.retiming_index(ServiceId::SetBaudrate, bound, desc, id, |e| {
            e.config_id == config_id
        })?;
        let found = index.ok_or_else(|| {
            self.reject(
                ServiceId::SetBaudrate,
                DispatchError::InvalidBaudrate(u32::from(config_id)),
            )
        })?;
        self.apply_baudrate(bound, desc, id, found)
    }

    /// Shared Stopped-gate + table search for the mutating baudrate pair.
    fn retiming_index(
        &self,
        service: ServiceId,
        bound: &Bound,
        desc: &ControllerDescriptor,
        id: ControllerId,
        matches: impl Fn(&candrv_common::config::BaudrateEntry) -> bool,
    ) -> Result<Option<usize>, DispatchError> {
        let current = bound.registry.state(id);
        if !current.allows_retiming() {
            return Err(self.reject(
                service,
                DispatchError::InvalidTransition {
                    current,
                    operation: RejectedRequest::Retiming,
                },
            ));
        }
        Ok(desc.baudrates.iter().position(matches))
    }

    fn apply_baudrate(
        &self,
        bound: &Bound,
        desc: &ControllerDescriptor,
        id: ControllerId,
        index: usize,
    ) -> Result<(), DispatchError> {
        let entry = &desc.baudrates[index];
        self.hw.init_controller(id, desc, entry)?;
        bound.registry.set_baudrate_index(id, index);
        info!(
            "controller {id}: baudrate changed to {} kbit/s (entry {index})",
            entry.bitrate_kbps
        );
        Ok(())
    }

    fn find_rate(
        &self,
        service: ServiceId,
        desc: &ControllerDescriptor,
        bitrate_kbps: u32,
    ) -> Result<usize, DispatchError> {
        desc.baudrates
            .iter()
            .position(|e| e.bitrate_kbps == bitrate_kbps)
            .ok_or_else(|| self.reject(service, DispatchError::InvalidBaudrate(bitrate_kbps)))
    }

    // ─── Pretended Networking ───────────────────────────────────────

    /// Apply (nonzero id) or deactivate (id 0) a Pretended-Networking
    /// configuration.
    ///
    /// Valid only for controllers whose descriptor carries PN support.
    /// Every request that reaches a valid controller raises exactly one
    /// `icom_result` notification, success or failure, independent of the
    /// returned result.
    pub fn set_icom_configuration(
        &self,
        id: ControllerId,
        config_id: u16,
    ) -> Result<(), DispatchError> {
        self.require(ServiceId::SetIcomConfiguration, DriverCapabilities::ICOM)?;
        let (bound, desc) = self.guard_controller(ServiceId::SetIcomConfiguration, id)?;

        if !desc.pn_support {
            self.listener.icom_result(id, config_id, IcomOutcome::Failed);
            return Err(self.reject(
                ServiceId::SetIcomConfiguration,
                DispatchError::InvalidController(id),
            ));
        }

        let result = if config_id == 0 {
            self.hw.deactivate_icom(id).map_err(DispatchError::Hardware)
        } else {
            match bound.config.icom.iter().find(|e| e.config_id == config_id) {
                Some(entry) => self.hw.set_icom(id, entry).map_err(DispatchError::Hardware),
                None => Err(self.reject(
                    ServiceId::SetIcomConfiguration,
                    DispatchError::InvalidIcomConfig(config_id),
                )),
            }
        };

        let outcome = if result.is_ok() {
            IcomOutcome::Applied
        } else {
            IcomOutcome::Failed
        };
        self.listener.icom_result(id, config_id, outcome);
        result
    }

    // ─── Wakeup ─────────────────────────────────────────────────────

    /// Synchronous wakeup query for one controller.
    ///
    /// On a latched event: records the descriptor's wakeup source with the
    /// power-management collaborator, completes hardware wakeup processing
    /// and moves a sleeping controller back to Stopped. Returns whether an
    /// event was detected.
    pub fn check_wakeup(&self, id: ControllerId) -> Result<bool, DispatchError> {
        self.require(ServiceId::CheckWakeup, DriverCapabilities::WAKEUP_CHECK)?;
        let (bound, desc) = self.guard_controller(ServiceId::CheckWakeup, id)?;

        if !self.hw.check_wakeup(id) {
            return Ok(false);
        }
        self.wakeup.wakeup_detected(id, desc.wakeup_source);
        self.hw.process_wakeup(id);
        if bound.registry.state(id) == ControllerState::Sleep {
            bound.registry.set_state(id, ControllerState::Stopped);
        }
        debug!("controller {id}: wakeup source {} recorded", desc.wakeup_source);
        Ok(true)
    }
}
