//! Engine-on-simulated-hardware integration tests.
//!
//! Drives the real dispatcher and poller against `SimHardware` end to end,
//! with the configuration loaded from a TOML file as in production.

use candrv_common::prelude::*;
use candrv_core::{CanDriver, DriverCapabilities};
use candrv_sim::SimHardware;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    TxConfirm(PduId),
    Rx(ControllerId, RxFrame),
    BusOff(ControllerId),
    Mode(ControllerId, ControllerState),
    Icom(ControllerId, u16, IcomOutcome),
    Wakeup(ControllerId, WakeupSourceId),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl CanListener for Recorder {
    fn tx_confirmation(&self, pdu: PduId) {
        self.push(Event::TxConfirm(pdu));
    }
    fn rx_indication(&self, controller: ControllerId, frame: &RxFrame) {
        self.push(Event::Rx(controller, frame.clone()));
    }
    fn bus_off(&self, controller: ControllerId) {
        self.push(Event::BusOff(controller));
    }
    fn mode_indication(&self, controller: ControllerId, state: ControllerState) {
        self.push(Event::Mode(controller, state));
    }
    fn icom_result(&self, controller: ControllerId, config_id: u16, outcome: IcomOutcome) {
        self.push(Event::Icom(controller, config_id, outcome));
    }
}

impl WakeupSink for Recorder {
    fn wakeup_detected(&self, controller: ControllerId, source: WakeupSourceId) {
        self.push(Event::Wakeup(controller, source));
    }
}

const CONFIG_TOML: &str = r#"
poll_groups = 1

[[controllers]]
hw_offset = 0x000
busoff_polling = true
wakeup_polling = true
wakeup_source = 4
pn_support = true
baudrates = [
    { bitrate_kbps = 500, config_id = 1 },
    { bitrate_kbps = 250, config_id = 2 },
]

[[icom]]
config_id = 3
payload = [0x01, 0x02]
"#;

fn build() -> (Arc<SimHardware>, Arc<Recorder>, CanDriver, CanConfig) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("can.toml");
    fs::write(&path, CONFIG_TOML).unwrap();
    let config = CanConfig::load(&path).expect("config should load");

    let hw = Arc::new(SimHardware::new(config.controllers.len()));
    let recorder = Arc::new(Recorder::default());
    let driver = CanDriver::new(
        hw.clone(),
        recorder.clone(),
        recorder.clone(),
        Arc::new(TracingReporter),
        DriverCapabilities::all(),
    );
    driver.init(config.clone()).expect("init should succeed");
    (hw, recorder, driver, config)
}

#[test]
fn init_leaves_controllers_stopped_with_interrupts_masked() {
    let (hw, _, driver, _) = build();
    assert_eq!(driver.controller_state(0), Ok(ControllerState::Stopped));
    assert_eq!(hw.mode(0), ControllerState::Stopped);
    assert!(!hw.irq_enabled(0));

    driver.enable_interrupts(0).unwrap();
    assert!(hw.irq_enabled(0));
    driver.disable_interrupts(0).unwrap();
    assert!(!hw.irq_enabled(0));
}

#[test]
fn mode_poll_drives_the_refresh_pass() {
    let (hw, _, driver, _) = build();
    driver.poll_modes();
    driver.poll_modes();
    assert_eq!(hw.refresh_count(0), 2);
}

#[test]
fn transmit_confirmation_round_trip() {
    let (hw, recorder, driver, _) = build();
    driver
        .set_controller_mode(0, ControllerTransition::Start)
        .unwrap();

    let pdu = TxPdu::with_data(42, 0, CanId::standard(0x123).unwrap(), &[1, 2, 3]).unwrap();
    assert_eq!(driver.write(&pdu), Ok(WriteOutcome::Accepted));
    // Until the bus finishes the frame, the handle stays busy.
    assert_eq!(driver.write(&pdu), Ok(WriteOutcome::Busy));

    hw.deliver_pending(0);
    driver.poll_transmit(0);

    assert!(recorder.events().contains(&Event::TxConfirm(42)));
    // Confirmation freed the handle.
    assert_eq!(driver.write(&pdu), Ok(WriteOutcome::Accepted));
}

#[test]
fn reception_indication_round_trip() {
    let (hw, recorder, driver, _) = build();
    let frame = RxFrame::from_slice(CanId::extended(0x18DA_F101).unwrap(), &[9, 8, 7]).unwrap();
    hw.inject_rx(0, frame.clone());

    driver.poll_receive(0);
    assert_eq!(
        recorder
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Rx(..)))
            .collect::<Vec<_>>(),
        vec![&Event::Rx(0, frame)]
    );
}

#[test]
fn bus_off_recovery_sequence() {
    let (hw, recorder, driver, _) = build();
    driver
        .set_controller_mode(0, ControllerTransition::Start)
        .unwrap();
    hw.raise_bus_off(0);

    driver.poll_bus_off(0);

    assert_eq!(driver.controller_state(0), Ok(ControllerState::Stopped));
    let events = recorder.events();
    assert!(events.contains(&Event::BusOff(0)));
    // The internal stop is silent; only the explicit start notified.
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::Mode(..)))
            .count(),
        1
    );

    // After recovery the controller restarts cleanly.
    driver
        .set_controller_mode(0, ControllerTransition::Start)
        .unwrap();
    assert_eq!(driver.controller_state(0), Ok(ControllerState::Started));
}

#[test]
fn sleep_wakeup_by_polling() {
    let (hw, recorder, driver, _) = build();
    driver
        .set_controller_mode(0, ControllerTransition::Sleep)
        .unwrap();
    hw.raise_wakeup(0);

    driver.poll_wakeup(0);

    assert_eq!(driver.controller_state(0), Ok(ControllerState::Stopped));
    assert!(recorder.events().contains(&Event::Wakeup(0, 4)));
    assert!(!hw.check_wakeup(0));
}

#[test]
fn baudrate_change_reprograms_the_hardware() {
    let (hw, _, driver, _) = build();
    assert_eq!(hw.active_bitrate(0), 500);

    driver.change_baudrate(0, 250).unwrap();
    assert_eq!(hw.active_bitrate(0), 250);

    // Running controllers refuse retiming; the hardware keeps its timing.
    driver
        .set_controller_mode(0, ControllerTransition::Start)
        .unwrap();
    assert!(matches!(
        driver.change_baudrate(0, 500),
        Err(DispatchError::InvalidTransition { .. })
    ));
    assert_eq!(hw.active_bitrate(0), 250);
}

#[test]
fn icom_lifecycle_on_hardware() {
    let (hw, recorder, driver, _) = build();
    driver.set_icom_configuration(0, 3).unwrap();
    assert_eq!(hw.icom_active(0), Some(3));

    driver.set_icom_configuration(0, 0).unwrap();
    assert_eq!(hw.icom_active(0), None);

    assert_eq!(
        recorder
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Icom(..)))
            .collect::<Vec<_>>(),
        vec![
            &Event::Icom(0, 3, IcomOutcome::Applied),
            &Event::Icom(0, 0, IcomOutcome::Applied),
        ]
    );
}
