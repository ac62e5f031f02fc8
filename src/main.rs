#![allow(dead_code, clippy::similar_names)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]
mod bus;
mod config;
mod flight_control;
mod logger;
mod peripherals;
mod sampling;
mod sensors;
mod util;

use crate::config::{FlightConfig, secs};
use crate::flight_control::{FlightContext, FlightSequencer};
use crate::peripherals::{Peripherals, drive_from_stdin, selftest};
use crate::sensors::{AltImu, SensorSuite, SyntheticSuite};
use crate::util::FlightFiles;
use futures::FutureExt;
use std::{env, panic::AssertUnwindSafe, process};

/// Tells the launcher script to power the computer down.
const EXIT_SHUTDOWN: i32 = 13;
const EXIT_TESTING: i32 = 0;
const EXIT_FAILURE: i32 = 1;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let config = load_config();
    let files = FlightFiles::new(&config.data_dir, chrono::Local::now());
    if let Err(e) = files.create_dir() {
        fatal!("Cannot create the data directory {}: {e}", files.dir().display());
    }
    if let Err(e) = logger::init_file(files.log()) {
        warn!("Logging to {} failed, console only: {e}", files.log().display());
    }
    if let Err(e) = config.archive(files.config()) {
        warn!("Archiving the configuration failed: {e}");
    }
    info!("Start of the log of {}", config.name);

    let Peripherals { inputs, mut outputs, console } = match Peripherals::from_config(&config) {
        Ok(peripherals) => peripherals,
        Err(e) => {
            error!("Opening the peripherals failed: {e:?}");
            process::exit(EXIT_FAILURE);
        }
    };
    if !console.is_empty() {
        tokio::spawn(drive_from_stdin(console));
    }
    let suite = detect_sensors(config.bus_id);

    if env::var("SRP_SELFTEST").is_ok() {
        let present = !suite.is_synthetic();
        let code = match selftest::run(&mut outputs, &inputs, present, secs(config.beep_period)).await {
            Ok(report) => {
                info!("Self-test finished: {report:?}");
                EXIT_TESTING
            }
            Err(e) => {
                error!("Self-test broke: {e:?}");
                EXIT_FAILURE
            }
        };
        drop(suite);
        outputs.close();
        process::exit(code);
    }

    let testing = config.testing;
    let mut sequencer = FlightSequencer::new(FlightContext::new(config, files), suite, inputs, outputs);
    let outcome = AssertUnwindSafe(sequencer.run()).catch_unwind().await;
    let code = match outcome {
        Ok(Ok(())) if testing => EXIT_TESTING,
        Ok(Ok(())) => EXIT_SHUTDOWN,
        Ok(Err(e)) => {
            error!("Main loop broke: {e:?}");
            EXIT_FAILURE
        }
        Err(_) => {
            error!("Main loop panicked in state {}", sequencer.state());
            EXIT_FAILURE
        }
    };
    sequencer.shutdown().await;
    process::exit(code);
}

/// Reads the document named by `SRP_CONFIG`, or falls back to the defaults.
fn load_config() -> FlightConfig {
    match env::var("SRP_CONFIG") {
        Ok(path) => FlightConfig::load(&path).unwrap_or_else(|e| fatal!("Cannot load the configuration {path}: {e:?}")),
        Err(_) => FlightConfig::default(),
    }
}

fn detect_sensors(bus_id: u8) -> Box<dyn SensorSuite> {
    match AltImu::detect(bus_id) {
        Ok(imu) => Box::new(imu),
        Err(fault) => {
            warn!("{fault}, the logged data will be generated by a synthetic source");
            Box::new(SyntheticSuite::new())
        }
    }
}
