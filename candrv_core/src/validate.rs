//! Precondition validation combinators.
//!
//! Every public operation funnels through `guard` (Ready gate) or
//! `guard_controller` (Ready gate + controller range/sentinel gate), so
//! the precondition contract lives in exactly one place. Violations are
//! reported through the fault side channel before the early return and
//! never mutate state.

use crate::driver::{Bound, CanDriver, DriverCapabilities};
use candrv_common::config::ControllerDescriptor;
use candrv_common::error::{DispatchError, ServiceId};
use candrv_common::frame::ControllerId;

impl CanDriver {
    /// Ready gate: the bound context, or `Uninitialized`.
    pub(crate) fn guard(&self, service: ServiceId) -> Result<&Bound, DispatchError> {
        self.bound
            .get()
            .ok_or_else(|| self.reject(service, DispatchError::Uninitialized))
    }

    /// Ready gate plus controller gate: the id must be in range and the
    /// descriptor slot populated.
    pub(crate) fn guard_controller(
        &self,
        service: ServiceId,
        id: ControllerId,
    ) -> Result<(&Bound, &ControllerDescriptor), DispatchError> {
        let bound = self.guard(service)?;
        match bound.config.controller(id) {
            Some(desc) if desc.is_configured() => Ok((bound, desc)),
            _ => Err(self.reject(service, DispatchError::InvalidController(id))),
        }
    }

    /// Capability gate for the optional request-surface groups.
    pub(crate) fn require(
        &self,
        service: ServiceId,
        cap: DriverCapabilities,
    ) -> Result<(), DispatchError> {
        if self.caps.contains(cap) {
            Ok(())
        } else {
            Err(self.reject(service, DispatchError::Unsupported))
        }
    }

    /// Report a violation through the side channel and hand the error back
    /// for the early return.
    pub(crate) fn reject(&self, service: ServiceId, error: DispatchError) -> DispatchError {
        self.reporter.report(service, &error);
        error
    }
}
