//! # candrv Simulation Binary
//!
//! Runs the CAN driver engine against the simulated hardware backend:
//! loads a TOML configuration, starts every configured controller, and
//! drives the cyclic poll schedule while feeding simulated bus traffic.
//!
//! # Usage
//!
//! ```bash
//! # Built-in demo configuration, poll every 10 ms until Ctrl-C
//! candrv_sim
//!
//! # Custom configuration and bounded run
//! candrv_sim --config config/can.toml --cycles 500 --period-ms 5
//!
//! # Verbose logging
//! candrv_sim -v
//! ```

#![deny(warnings)]

use candrv_common::prelude::*;
use candrv_core::{CanDriver, DriverCapabilities};
use candrv_sim::SimHardware;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// candrv simulation - CAN driver engine on emulated controllers
#[derive(Parser, Debug)]
#[command(name = "candrv_sim")]
#[command(version)]
#[command(about = "CAN driver engine running against simulated controllers")]
struct Args {
    /// Path to the driver configuration file (TOML). A built-in
    /// two-controller demo configuration is used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Poll period per cycle [ms].
    #[arg(long, default_value_t = 10)]
    period_ms: u64,

    /// Number of cycles to run (0 = until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

/// Listener tracing every upstream notification.
struct LogListener;

impl CanListener for LogListener {
    fn tx_confirmation(&self, pdu: PduId) {
        info!("tx confirmed: pdu {pdu}");
    }

    fn rx_indication(&self, controller: ControllerId, frame: &RxFrame) {
        info!(
            "rx on controller {controller}: id 0x{:X}, {} byte(s)",
            frame.id.raw(),
            frame.data.len()
        );
    }

    fn bus_off(&self, controller: ControllerId) {
        info!("controller {controller}: bus-off");
    }

    fn mode_indication(&self, controller: ControllerId, state: ControllerState) {
        info!("controller {controller}: mode {state:?}");
    }

    fn icom_result(&self, controller: ControllerId, config_id: u16, outcome: IcomOutcome) {
        info!("controller {controller}: ICOM config {config_id} {outcome:?}");
    }
}

impl WakeupSink for LogListener {
    fn wakeup_detected(&self, controller: ControllerId, source: WakeupSourceId) {
        info!("controller {controller}: wakeup from source {source}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("simulation failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    let config = match &args.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            CanConfig::load(path)?
        }
        None => {
            info!("using built-in demo configuration");
            demo_config()
        }
    };

    let hw = Arc::new(SimHardware::new(config.controllers.len()));
    let listener = Arc::new(LogListener);
    let driver = CanDriver::new(
        hw.clone(),
        listener.clone(),
        listener,
        Arc::new(TracingReporter),
        DriverCapabilities::all(),
    );

    let info = driver.version_info();
    info!(
        "candrv v{} (vendor {}, module {}) starting...",
        info.version, info.vendor_id, info.module_id
    );

    driver.init(config.clone())?;
    for id in config.configured_ids() {
        driver.set_controller_mode(id, ControllerTransition::Start)?;
    }

    // Shutdown flag toggled by Ctrl-C.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let period = std::time::Duration::from_millis(args.period_ms);
    let mut cycle: u64 = 0;
    let tx_id = CanId::standard(0x123).ok_or("bad demo id")?;
    let rx_id = CanId::standard(0x456).ok_or("bad demo id")?;

    while running.load(Ordering::SeqCst) && (args.cycles == 0 || cycle < args.cycles) {
        // Feed the bus: one transmit request and, every fifth cycle, one
        // incoming frame on controller 0.
        let pdu = TxPdu::with_data(
            (cycle % u64::from(u16::MAX)) as PduId,
            0,
            tx_id,
            &cycle.to_le_bytes(),
        )
        .ok_or("demo payload exceeds frame capacity")?;
        match driver.write(&pdu) {
            Ok(WriteOutcome::Accepted) | Ok(WriteOutcome::Busy) => {}
            Err(e) => error!("write failed: {e}"),
        }
        if cycle % 5 == 0 {
            if let Some(frame) = RxFrame::from_slice(rx_id, &[0xCA, 0xFE]) {
                hw.inject_rx(0, frame);
            }
        }
        // Let the simulated bus finish whatever is in the mailboxes.
        for id in config.configured_ids() {
            hw.deliver_pending(id);
        }

        // The poll schedule an external scheduler would drive.
        for group in 0..config.poll_groups {
            driver.poll_transmit(group);
            driver.poll_receive(group);
            driver.poll_bus_off(group);
            driver.poll_wakeup(group);
        }
        driver.poll_modes();

        cycle += 1;
        std::thread::sleep(period);
    }

    info!("simulation finished after {cycle} cycle(s)");
    Ok(())
}

/// Two controllers, one polling group, bus-off polling on the first.
fn demo_config() -> CanConfig {
    CanConfig {
        poll_groups: 1,
        controllers: vec![
            ControllerDescriptor {
                hw_offset: 0x000,
                baudrates: vec![
                    BaudrateEntry {
                        bitrate_kbps: 500,
                        config_id: 1,
                    },
                    BaudrateEntry {
                        bitrate_kbps: 250,
                        config_id: 2,
                    },
                ],
                busoff_polling: true,
                wakeup_polling: true,
                wakeup_source: 1,
                ..Default::default()
            },
            ControllerDescriptor {
                hw_offset: 0x040,
                baudrates: vec![BaudrateEntry {
                    bitrate_kbps: 500,
                    config_id: 1,
                }],
                ..Default::default()
            },
        ],
        icom: vec![],
    }
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
