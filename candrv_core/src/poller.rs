//! Cyclic poll-group sweeps.
//!
//! The external scheduler invokes each entry point at its configured
//! period, passing the polling group to sweep. Groups partition the
//! configured controllers (descriptor `poll_group`), so polling cost can
//! be balanced across several periodic tasks. Every entry point reports
//! `Uninitialized` and returns early when the driver is not Ready.

use crate::driver::CanDriver;
use candrv_common::error::ServiceId;
use candrv_common::state::{ControllerState, ControllerTransition};
use tracing::{debug, warn};

impl CanDriver {
    /// Sweep transmit mailboxes of one polling group.
    ///
    /// Completed transmissions release their ledger claim and raise one
    /// `tx_confirmation` each.
    pub fn poll_transmit(&self, group: u8) {
        let Ok(bound) = self.guard(ServiceId::PollTransmit) else {
            return;
        };
        for (id, _) in bound.group_members(group) {
            for completion in self.hw.poll_transmit(id) {
                bound.ledger.release(completion.hth);
                self.listener.tx_confirmation(completion.pdu);
            }
        }
    }

    /// Sweep receive mailboxes of one polling group.
    pub fn poll_receive(&self, group: u8) {
        let Ok(bound) = self.guard(ServiceId::PollReceive) else {
            return;
        };
        for (id, _) in bound.group_members(group) {
            for frame in self.hw.poll_receive(id) {
                self.listener.rx_indication(id, &frame);
            }
        }
    }

    /// Sweep bus-off flags of one polling group.
    ///
    /// Only descriptors with bus-off polling enabled and only Started
    /// controllers are inspected. On detection the controller is driven
    /// through an internal silent Stop (no mode indication), recovery
    /// processing runs, and exactly one `bus_off` notification fires,
    /// strictly after Stopped is visible in the registry.
    pub fn poll_bus_off(&self, group: u8) {
        let Ok(bound) = self.guard(ServiceId::PollBusOff) else {
            return;
        };
        for (id, desc) in bound.group_members(group) {
            if !desc.busoff_polling {
                continue;
            }
            if bound.registry.state(id) != ControllerState::Started {
                continue;
            }
            if !self.hw.check_bus_off(id) {
                continue;
            }

            bound.registry.set_state(id, ControllerState::BusOff);
            if let Err(fault) = self.hw.set_mode(id, desc, ControllerTransition::Stop) {
                warn!("controller {id}: stop during bus-off recovery failed: {fault}");
            }
            bound.registry.set_state(id, ControllerState::Stopped);
            self.hw.process_bus_off(id);
            debug!("controller {id}: bus-off, stopped");
            self.listener.bus_off(id);
        }
    }

    /// Sweep wakeup flags of one polling group.
    ///
    /// Only descriptors with wakeup polling enabled and only Sleep
    /// controllers are inspected. On detection the wakeup source is
    /// recorded with the power-management collaborator, hardware wakeup
    /// processing completes and the controller returns to Stopped.
    pub fn poll_wakeup(&self, group: u8) {
        let Ok(bound) = self.guard(ServiceId::PollWakeup) else {
            return;
        };
        for (id, desc) in bound.group_members(group) {
            if !desc.wakeup_polling {
                continue;
            }
            if bound.registry.state(id) != ControllerState::Sleep {
                continue;
            }
            if !self.hw.check_wakeup(id) {
                continue;
            }

            self.wakeup.wakeup_detected(id, desc.wakeup_source);
            self.hw.process_wakeup(id);
            bound.registry.set_state(id, ControllerState::Stopped);
            debug!("controller {id}: wakeup by polling, source {}", desc.wakeup_source);
        }
    }

    /// Hardware state-refresh pass; no per-controller filtering here.
    pub fn poll_modes(&self) {
        if self.guard(ServiceId::PollModes).is_err() {
            return;
        }
        self.hw.refresh_modes();
    }
}
