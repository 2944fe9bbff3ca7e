//! Software-emulated CAN controllers.
//!
//! Each controller owns a fixed block of transmit mailboxes addressed by
//! hardware transmit-handles: handle `h` belongs to controller
//! `h / TX_SLOTS_PER_CONTROLLER`. Test and demo code injects bus events
//! through the `raise_*`/`inject_rx`/`deliver_pending` helpers; the engine
//! observes them through the regular polling surface.

use candrv_common::config::{BaudrateEntry, ControllerDescriptor, IcomEntry};
use candrv_common::error::HwFault;
use candrv_common::frame::{ControllerId, RxFrame, TxHandle, TxPdu};
use candrv_common::hw::{CanHardware, TxCompletion, WriteOutcome};
use candrv_common::state::{ControllerState, ControllerTransition};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

/// Transmit mailboxes per simulated controller.
pub const TX_SLOTS_PER_CONTROLLER: usize = 4;

/// One pending transmission in a mailbox slot.
#[derive(Debug, Clone, Copy)]
struct PendingTx {
    hth: TxHandle,
    pdu: u16,
}

/// Mutable state of one simulated controller.
#[derive(Debug, Default)]
struct SimController {
    /// Times `init_controller` ran (init + baudrate changes).
    init_count: u32,
    /// Bit-rate programmed by the last initialization.
    active_bitrate_kbps: u32,
    /// Mirrored mode as last programmed.
    mode: ControllerState,
    /// Interrupt sources unmasked.
    irq_enabled: bool,
    /// Transmit mailboxes.
    slots: [Option<PendingTx>; TX_SLOTS_PER_CONTROLLER],
    /// Finished transmissions awaiting the transmit poll.
    completed: Vec<TxCompletion>,
    /// Frames awaiting the receive poll.
    rx_queue: VecDeque<RxFrame>,
    /// Latched bus-off condition.
    bus_off: bool,
    /// Latched wakeup event.
    wakeup: bool,
    /// Active ICOM configuration id.
    icom_active: Option<u16>,
    /// State-refresh passes observed.
    refreshes: u64,
}

/// Simulated hardware backend for any number of controllers.
pub struct SimHardware {
    controllers: Vec<Mutex<SimController>>,
}

impl SimHardware {
    /// Create a backend with the given controller count.
    pub fn new(count: usize) -> Self {
        info!("simulated CAN hardware with {count} controller(s)");
        Self {
            controllers: (0..count).map(|_| Mutex::new(SimController::default())).collect(),
        }
    }

    fn lock(&self, id: ControllerId) -> std::sync::MutexGuard<'_, SimController> {
        self.controllers[id as usize]
            .lock()
            .expect("sim controller lock poisoned")
    }

    /// The controller owning a transmit handle.
    fn owner(&self, hth: TxHandle) -> Option<ControllerId> {
        let id = (hth as usize) / TX_SLOTS_PER_CONTROLLER;
        (id < self.controllers.len()).then_some(id as ControllerId)
    }

    // ─── Bus Event Injection ────────────────────────────────────────

    /// Queue a received frame.
    pub fn inject_rx(&self, id: ControllerId, frame: RxFrame) {
        self.lock(id).rx_queue.push_back(frame);
    }

    /// Latch a bus-off condition.
    pub fn raise_bus_off(&self, id: ControllerId) {
        self.lock(id).bus_off = true;
    }

    /// Latch a wakeup event.
    pub fn raise_wakeup(&self, id: ControllerId) {
        self.lock(id).wakeup = true;
    }

    /// Finish every pending transmission: mailboxes drain into the
    /// completion queue the next transmit poll picks up.
    pub fn deliver_pending(&self, id: ControllerId) {
        let mut guard = self.lock(id);
        let ctrl = &mut *guard;
        for slot in ctrl.slots.iter_mut() {
            if let Some(tx) = slot.take() {
                ctrl.completed.push(TxCompletion {
                    hth: tx.hth,
                    pdu: tx.pdu,
                });
            }
        }
    }

    // ─── Inspection ─────────────────────────────────────────────────

    /// Bit-rate programmed by the last initialization.
    pub fn active_bitrate(&self, id: ControllerId) -> u32 {
        self.lock(id).active_bitrate_kbps
    }

    /// Times `init_controller` ran for this controller.
    pub fn init_count(&self, id: ControllerId) -> u32 {
        self.lock(id).init_count
    }

    /// Mode as last programmed.
    pub fn mode(&self, id: ControllerId) -> ControllerState {
        self.lock(id).mode
    }

    /// Whether interrupt sources are unmasked.
    pub fn irq_enabled(&self, id: ControllerId) -> bool {
        self.lock(id).irq_enabled
    }

    /// State-refresh passes observed.
    pub fn refresh_count(&self, id: ControllerId) -> u64 {
        self.lock(id).refreshes
    }

    /// Active ICOM configuration id, if any.
    pub fn icom_active(&self, id: ControllerId) -> Option<u16> {
        self.lock(id).icom_active
    }

    /// Pending (not yet delivered) transmissions.
    pub fn pending_count(&self, id: ControllerId) -> usize {
        self.lock(id).slots.iter().filter(|s| s.is_some()).count()
    }
}

impl CanHardware for SimHardware {
    fn init_variables(&self) {
        debug!("sim: global variables initialized");
    }

    fn init_controller(
        &self,
        id: ControllerId,
        _desc: &ControllerDescriptor,
        baudrate: &BaudrateEntry,
    ) -> Result<(), HwFault> {
        let mut ctrl = self.lock(id);
        ctrl.init_count += 1;
        ctrl.active_bitrate_kbps = baudrate.bitrate_kbps;
        ctrl.mode = ControllerState::Stopped;
        ctrl.slots = [None; TX_SLOTS_PER_CONTROLLER];
        debug!("sim: controller {id} timed at {} kbit/s", baudrate.bitrate_kbps);
        Ok(())
    }

    fn set_mode(
        &self,
        id: ControllerId,
        _desc: &ControllerDescriptor,
        transition: ControllerTransition,
    ) -> Result<(), HwFault> {
        let mut ctrl = self.lock(id);
        ctrl.mode = transition.target();
        debug!("sim: controller {id} -> {:?}", ctrl.mode);
        Ok(())
    }

    fn enable_interrupts(&self, id: ControllerId, _desc: &ControllerDescriptor) {
        self.lock(id).irq_enabled = true;
    }

    fn disable_interrupts(&self, id: ControllerId) {
        self.lock(id).irq_enabled = false;
    }

    fn write(&self, hth: TxHandle, pdu: &TxPdu) -> Result<WriteOutcome, HwFault> {
        let Some(id) = self.owner(hth) else {
            return Err(HwFault::TransmitFailed(format!(
                "transmit handle {hth} maps to no controller"
            )));
        };
        let mut ctrl = self.lock(id);
        if ctrl.slots.iter().flatten().any(|tx| tx.hth == hth) {
            return Ok(WriteOutcome::Busy);
        }
        match ctrl.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(PendingTx {
                    hth,
                    pdu: pdu.pdu,
                });
                Ok(WriteOutcome::Accepted)
            }
            None => Ok(WriteOutcome::Busy),
        }
    }

    fn abort_transmit(&self, hth: TxHandle) {
        if let Some(id) = self.owner(hth) {
            let mut ctrl = self.lock(id);
            for slot in ctrl.slots.iter_mut() {
                if slot.is_some_and(|tx| tx.hth == hth) {
                    *slot = None;
                }
            }
        }
    }

    fn poll_transmit(&self, id: ControllerId) -> Vec<TxCompletion> {
        std::mem::take(&mut self.lock(id).completed)
    }

    fn poll_receive(&self, id: ControllerId) -> Vec<RxFrame> {
        self.lock(id).rx_queue.drain(..).collect()
    }

    fn check_bus_off(&self, id: ControllerId) -> bool {
        self.lock(id).bus_off
    }

    fn process_bus_off(&self, id: ControllerId) {
        let mut ctrl = self.lock(id);
        ctrl.bus_off = false;
        // Bus-off discards whatever was still in the mailboxes.
        ctrl.slots = [None; TX_SLOTS_PER_CONTROLLER];
    }

    fn check_wakeup(&self, id: ControllerId) -> bool {
        self.lock(id).wakeup
    }

    fn process_wakeup(&self, id: ControllerId) {
        self.lock(id).wakeup = false;
    }

    fn refresh_modes(&self) {
        for ctrl in &self.controllers {
            ctrl.lock().expect("sim controller lock poisoned").refreshes += 1;
        }
    }

    fn set_icom(&self, id: ControllerId, entry: &IcomEntry) -> Result<(), HwFault> {
        self.lock(id).icom_active = Some(entry.config_id);
        Ok(())
    }

    fn deactivate_icom(&self, id: ControllerId) -> Result<(), HwFault> {
        self.lock(id).icom_active = None;
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use candrv_common::frame::CanId;

    fn desc() -> ControllerDescriptor {
        ControllerDescriptor {
            hw_offset: 0x40,
            baudrates: vec![BaudrateEntry {
                bitrate_kbps: 500,
                config_id: 1,
            }],
            ..Default::default()
        }
    }

    fn tx(pdu: u16, hth: TxHandle) -> TxPdu {
        TxPdu::with_data(pdu, hth, CanId::standard(0x100).unwrap(), &[0xAB]).unwrap()
    }

    #[test]
    fn mailboxes_fill_then_busy() {
        let hw = SimHardware::new(1);
        // Controller 0 owns handles 0..4.
        for h in 0..TX_SLOTS_PER_CONTROLLER as TxHandle {
            assert_eq!(hw.write(h, &tx(h, h)), Ok(WriteOutcome::Accepted));
        }
        assert_eq!(hw.pending_count(0), TX_SLOTS_PER_CONTROLLER);
        // All slots taken: handle reuse and overflow both report busy.
        assert_eq!(hw.write(0, &tx(9, 0)), Ok(WriteOutcome::Busy));
    }

    #[test]
    fn delivery_completes_transmissions() {
        let hw = SimHardware::new(1);
        hw.write(0, &tx(7, 0)).unwrap();
        hw.write(1, &tx(8, 1)).unwrap();

        hw.deliver_pending(0);
        let completions = hw.poll_transmit(0);
        assert_eq!(completions.len(), 2);
        assert!(completions.contains(&TxCompletion { hth: 0, pdu: 7 }));
        assert!(completions.contains(&TxCompletion { hth: 1, pdu: 8 }));
        // Drained.
        assert!(hw.poll_transmit(0).is_empty());
        assert_eq!(hw.pending_count(0), 0);
    }

    #[test]
    fn abort_clears_one_mailbox() {
        let hw = SimHardware::new(1);
        hw.write(0, &tx(7, 0)).unwrap();
        hw.write(1, &tx(8, 1)).unwrap();

        hw.abort_transmit(0);
        assert_eq!(hw.pending_count(0), 1);
        // Aborted frame never completes.
        hw.deliver_pending(0);
        let completions = hw.poll_transmit(0);
        assert_eq!(completions, vec![TxCompletion { hth: 1, pdu: 8 }]);
    }

    #[test]
    fn handle_outside_any_controller_faults() {
        let hw = SimHardware::new(1);
        let result = hw.write(99, &tx(1, 99));
        assert!(matches!(result, Err(HwFault::TransmitFailed(_))));
    }

    #[test]
    fn rx_queue_drains_in_order() {
        let hw = SimHardware::new(2);
        let f1 = RxFrame::from_slice(CanId::standard(0x10).unwrap(), &[1]).unwrap();
        let f2 = RxFrame::from_slice(CanId::standard(0x20).unwrap(), &[2]).unwrap();
        hw.inject_rx(1, f1.clone());
        hw.inject_rx(1, f2.clone());

        assert!(hw.poll_receive(0).is_empty());
        assert_eq!(hw.poll_receive(1), vec![f1, f2]);
        assert!(hw.poll_receive(1).is_empty());
    }

    #[test]
    fn bus_off_latch_and_recovery() {
        let hw = SimHardware::new(1);
        hw.write(0, &tx(7, 0)).unwrap();
        assert!(!hw.check_bus_off(0));

        hw.raise_bus_off(0);
        assert!(hw.check_bus_off(0));

        hw.process_bus_off(0);
        assert!(!hw.check_bus_off(0));
        // Recovery discarded the pending mailbox.
        assert_eq!(hw.pending_count(0), 0);
    }

    #[test]
    fn wakeup_latch_clears_on_processing() {
        let hw = SimHardware::new(1);
        hw.raise_wakeup(0);
        assert!(hw.check_wakeup(0));
        hw.process_wakeup(0);
        assert!(!hw.check_wakeup(0));
    }

    #[test]
    fn init_reprograms_timing_and_clears_mailboxes() {
        let hw = SimHardware::new(1);
        let d = desc();
        hw.init_controller(0, &d, &d.baudrates[0]).unwrap();
        assert_eq!(hw.active_bitrate(0), 500);

        hw.write(0, &tx(7, 0)).unwrap();
        let retimed = BaudrateEntry {
            bitrate_kbps: 250,
            config_id: 2,
        };
        hw.init_controller(0, &d, &retimed).unwrap();
        assert_eq!(hw.active_bitrate(0), 250);
        assert_eq!(hw.pending_count(0), 0);
        assert_eq!(hw.init_count(0), 2);
    }

    #[test]
    fn mode_and_irq_mirror_programming() {
        let hw = SimHardware::new(1);
        let d = desc();
        assert_eq!(hw.mode(0), ControllerState::Stopped);

        hw.set_mode(0, &d, ControllerTransition::Start).unwrap();
        assert_eq!(hw.mode(0), ControllerState::Started);
        hw.set_mode(0, &d, ControllerTransition::Stop).unwrap();
        assert_eq!(hw.mode(0), ControllerState::Stopped);

        assert!(!hw.irq_enabled(0));
        hw.enable_interrupts(0, &d);
        assert!(hw.irq_enabled(0));
        hw.disable_interrupts(0);
        assert!(!hw.irq_enabled(0));
    }

    #[test]
    fn refresh_pass_counts_every_controller() {
        let hw = SimHardware::new(2);
        hw.refresh_modes();
        hw.refresh_modes();
        assert_eq!(hw.refresh_count(0), 2);
        assert_eq!(hw.refresh_count(1), 2);
    }

    #[test]
    fn icom_programming() {
        let hw = SimHardware::new(1);
        assert_eq!(hw.icom_active(0), None);
        hw.set_icom(
            0,
            &IcomEntry {
                config_id: 5,
                payload: vec![1, 2],
            },
        )
        .unwrap();
        assert_eq!(hw.icom_active(0), Some(5));
        hw.deactivate_icom(0).unwrap();
        assert_eq!(hw.icom_active(0), None);
    }
}
