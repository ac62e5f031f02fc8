use super::*;
use crate::bus::mock_bus::MockBus;
use crate::config::{CalibrationSamples, FlightConfig};
use crate::peripherals::{Peripherals, Probes};
use crate::sensors::{AltImu, BARO, SensorSuite, SyntheticSuite};
use crate::util::FlightFiles;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use std::time::Duration;

const LPS: u8 = 0x5d;
/// Raw barometer counts of 101325 Pa.
const GROUND_RAW: i32 = 4_150_272;

fn test_config() -> FlightConfig {
    let dir = std::env::temp_dir().join(format!("srp-flight-{}", rand::random::<u64>()));
    FlightConfig {
        data_dir: dir.to_string_lossy().into_owned(),
        calibration: CalibrationSamples { gyro: 5, baro: 5, p0: 5, delay: 0.0 },
        landing_settle_delay: 0.0,
        ..FlightConfig::default()
    }
}

/// Every device of the suite shares `bus`, the barometer reads ground pressure.
fn mock_suite(bus: &MockBus) -> Box<dyn SensorSuite> {
    bus.set_bytes(LPS, 0x28, &GROUND_RAW.to_le_bytes()[..3]);
    Box::new(AltImu::new(bus.clone(), bus.clone(), bus.clone()))
}

/// Power-down pattern of LSM6DS33, LIS3MDL and LPS25H.
const POWER_DOWN_WRITES: [(u8, u8, u8); 4] =
    [(0x6b, 0x10, 0x00), (0x6b, 0x11, 0x00), (0x1e, 0x22, 0x03), (LPS, 0x20, 0x00)];

fn rig(config: FlightConfig, suite: Box<dyn SensorSuite>) -> (FlightSequencer, Probes) {
    let files = FlightFiles::new(&config.data_dir, Local::now());
    files.create_dir().unwrap();
    let (peripherals, probes) = Peripherals::synthetic(&config);
    let Peripherals { inputs, outputs, .. } = peripherals;
    (FlightSequencer::new(FlightContext::new(config, files), suite, inputs, outputs), probes)
}

fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap() }

fn at(ms: i64) -> DateTime<Utc> { t0() + TimeDelta::milliseconds(ms) }

/// Feeds `(breakwire, arm_switch, ms)` steps through a fresh sequencer.
async fn fly(steps: &[(bool, bool, i64)]) -> Vec<FlightState> {
    let (mut seq, probes) = rig(test_config(), mock_suite(&MockBus::new()));
    let mut states = Vec::new();
    for &(breakwire, arm_switch, ms) in steps {
        probes.breakwire.set(breakwire);
        probes.arm_switch.set(arm_switch);
        seq.tick(at(ms)).await.unwrap();
        states.push(seq.state());
    }
    seq.shutdown().await;
    states
}

async fn step(seq: &mut FlightSequencer, probes: &Probes, breakwire: bool, arm_switch: bool) -> FlightState {
    probes.breakwire.set(breakwire);
    probes.arm_switch.set(arm_switch);
    seq.tick(Utc::now()).await.unwrap();
    seq.state()
}

#[tokio::test]
async fn same_inputs_give_same_states() {
    use FlightState::*;
    let steps = [
        (true, false, 0),
        (true, true, 100),
        (false, true, 200),
        (false, true, 1_000),
        (false, true, 12_999),
        (false, true, 13_000),
        (false, true, 20_999),
        (false, true, 21_000),
        (false, true, 22_000),
        (false, false, 23_000),
    ];
    let expected = vec![Prepared, Armed, Launched, Launched, Launched, Deployed, Deployed, Landed, Landed, Off];
    assert_eq!(fly(&steps).await, expected);
    assert_eq!(fly(&steps).await, expected);
}

#[tokio::test]
async fn arming_calibrates_once_and_starts_sampling() {
    let (mut seq, probes) = rig(test_config(), mock_suite(&MockBus::new()));
    assert_eq!(step(&mut seq, &probes, true, false).await, FlightState::Prepared);
    assert_eq!(step(&mut seq, &probes, true, true).await, FlightState::Armed);
    // disarming right after calibration is a setback, sampling keeps running
    assert_eq!(step(&mut seq, &probes, true, false).await, FlightState::Prepared);
    assert_eq!(step(&mut seq, &probes, true, true).await, FlightState::Armed);
    assert_eq!(step(&mut seq, &probes, true, true).await, FlightState::Armed);
    assert_eq!(step(&mut seq, &probes, true, false).await, FlightState::Prepared);
    assert_eq!(step(&mut seq, &probes, false, false).await, FlightState::Idle);

    assert_eq!(seq.scheduler().len(), 3);
    assert!(seq.scheduler().is_running());
    let nav = seq.context().nav().await;
    assert!(nav.altitude.abs() < 0.01);
    assert_eq!(seq.context().state(), FlightState::Idle);
    seq.shutdown().await;
    assert!(seq.scheduler().is_stopped());
    assert!(seq.scheduler().is_empty());
    let baro = seq.context().files().channel(BARO);
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(baro).unwrap();
    assert!(reader.records().next().is_some());
}

#[tokio::test]
async fn launch_needs_the_breakwire_removed_while_armed() {
    let (mut seq, probes) = rig(test_config(), Box::new(SyntheticSuite::new()));
    assert_eq!(step(&mut seq, &probes, true, false).await, FlightState::Prepared);
    assert_eq!(step(&mut seq, &probes, true, true).await, FlightState::Armed);
    assert_eq!(step(&mut seq, &probes, false, true).await, FlightState::Launched);
    seq.shutdown().await;
}

#[tokio::test]
async fn shutdown_powers_down_armed_sensors() {
    let bus = MockBus::new();
    let (mut seq, probes) = rig(test_config(), mock_suite(&bus));
    assert_eq!(step(&mut seq, &probes, true, false).await, FlightState::Prepared);
    assert_eq!(step(&mut seq, &probes, true, true).await, FlightState::Armed);
    bus.clear_writes();

    seq.shutdown().await;
    let writes = bus.writes();
    for write in POWER_DOWN_WRITES {
        assert!(writes.contains(&write), "{write:x?} missing from {writes:x?}");
    }
}

#[tokio::test]
async fn shutdown_powers_down_sensors_never_armed() {
    let bus = MockBus::new();
    let (mut seq, _probes) = rig(test_config(), mock_suite(&bus));
    seq.tick(t0()).await.unwrap();
    assert!(bus.writes().is_empty());

    seq.shutdown().await;
    assert_eq!(bus.writes(), POWER_DOWN_WRITES.to_vec());
}

#[tokio::test]
async fn deploy_fail_safe_fires_at_window_end() {
    let config = test_config();
    let hatch_open = config.hatch_open;
    let (mut seq, probes) = rig(config, Box::new(SyntheticSuite::new()));
    seq.force_state(FlightState::Launched);
    seq.tick(t0()).await.unwrap();
    seq.tick(at(11_999)).await.unwrap();
    assert_eq!(seq.state(), FlightState::Launched);
    assert_eq!(probes.hatch.last(), None);

    seq.tick(at(12_000)).await.unwrap();
    assert_eq!(seq.state(), FlightState::Deployed);
    assert_eq!(probes.hatch.last(), Some(hatch_open));
}

#[tokio::test]
async fn landing_fail_safe_fires_at_window_end() {
    let config = test_config();
    let [_, landing_end] = config.landing_window;
    let [_, altitude_max] = config.landing_altitude_range;
    let (mut seq, probes) = rig(config, Box::new(SyntheticSuite::new()));
    {
        let lock = seq.context().estimator();
        let mut estimator = lock.write().await;
        estimator.seed(101_325.0);
        for _ in 0..20 {
            estimator.update(4_100_000, 0.02);
        }
        assert!(estimator.snapshot().altitude > altitude_max);
    }
    seq.force_state(FlightState::Launched);
    seq.tick(t0()).await.unwrap();
    seq.tick(at(12_000)).await.unwrap();
    assert_eq!(seq.state(), FlightState::Deployed);

    #[allow(clippy::cast_possible_truncation)]
    let end_ms = (landing_end * 1000.0) as i64;
    for ms in [20_000, end_ms / 2, end_ms - 1] {
        seq.tick(at(ms)).await.unwrap();
        assert_eq!(seq.state(), FlightState::Deployed, "at {ms} ms");
    }
    seq.tick(at(end_ms)).await.unwrap();
    assert_eq!(seq.state(), FlightState::Landed);
    assert_eq!(seq.last_state(), FlightState::Deployed);
    assert_eq!(probes.hatch.last(), Some(FlightConfig::default().hatch_open));
}

#[tokio::test(start_paused = true)]
async fn final_beep_plays_out_before_shutdown() {
    let (mut seq, probes) = rig(test_config(), Box::new(SyntheticSuite::new()));
    let beeps = || probes.buzzer.history().iter().filter(|on| **on).count();
    probes.arm_switch.set(true);
    seq.force_state(FlightState::Landed);
    seq.tick(Utc::now()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(beeps(), 1);

    probes.arm_switch.set(false);
    assert_eq!(seq.tick(Utc::now()).await.unwrap(), TickOutcome::Stop);
    seq.shutdown().await;
    // the interrupted apogee dash plus both progress beeps
    assert_eq!(beeps(), 3);
}

#[tokio::test]
async fn descent_deploys_early_inside_the_window() {
    let config = test_config();
    let hatch_open = config.hatch_open;
    let (mut seq, probes) = rig(config, Box::new(SyntheticSuite::new()));
    {
        let lock = seq.context().estimator();
        let mut estimator = lock.write().await;
        estimator.seed(101_325.0);
        estimator.update(4_100_000, 0.02);
        for _ in 0..6 {
            estimator.update(i64::from(GROUND_RAW), 0.02);
        }
        let nav = estimator.snapshot();
        assert!(nav.velocity < -1.0 && nav.altitude < 1000.0, "{nav:?}");
    }
    seq.force_state(FlightState::Launched);
    seq.tick(t0()).await.unwrap();
    seq.tick(at(2_999)).await.unwrap();
    assert_eq!(seq.state(), FlightState::Launched);
    seq.tick(at(3_000)).await.unwrap();
    assert_eq!(seq.state(), FlightState::Deployed);
    assert_eq!(probes.hatch.last(), Some(hatch_open));
    assert_eq!(seq.last_state(), FlightState::Launched);
}

#[tokio::test(start_paused = true)]
async fn apogee_report_repeats_only_when_finished() {
    let (mut seq, probes) = rig(test_config(), Box::new(SyntheticSuite::new()));
    let beeps = || probes.buzzer.history().iter().filter(|on| **on).count();
    probes.arm_switch.set(true);
    seq.force_state(FlightState::Landed);

    assert_eq!(seq.tick(Utc::now()).await.unwrap(), TickOutcome::Continue);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(beeps(), 1);
    seq.tick(Utc::now()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(beeps(), 1);

    // one dash for an apogee of 0 m, plus the pause
    tokio::time::sleep(Duration::from_secs(6)).await;
    seq.tick(Utc::now()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(beeps(), 2);

    probes.arm_switch.set(false);
    assert_eq!(seq.tick(Utc::now()).await.unwrap(), TickOutcome::Stop);
    assert_eq!(seq.state(), FlightState::Off);
    assert_eq!(seq.last_state(), FlightState::Landed);
    assert_eq!(seq.context().state(), FlightState::Off);
    assert_eq!(seq.tick(Utc::now()).await.unwrap(), TickOutcome::Stop);
}

#[tokio::test]
async fn unknown_state_is_held() {
    let (mut seq, probes) = rig(test_config(), Box::new(SyntheticSuite::new()));
    probes.breakwire.set(true);
    seq.force_state(FlightState::Unknown);
    for _ in 0..3 {
        assert_eq!(seq.tick(Utc::now()).await.unwrap(), TickOutcome::Continue);
        assert_eq!(seq.state(), FlightState::Unknown);
    }
    assert_eq!(probes.hatch.last(), None);
}

#[tokio::test]
async fn control_loop_flies_a_synthetic_mission() {
    let config = FlightConfig {
        testing: true,
        statemachine_interval: 0.001,
        deploy_window: [0.0, 0.05],
        landing_window: [0.0, 0.1],
        ..test_config()
    };
    let hatch_open = config.hatch_open;
    let (mut seq, probes) = rig(config, Box::new(SyntheticSuite::new()));
    let mut state_rx = seq.context().subscribe_state();
    let operator = tokio::spawn(async move {
        probes.breakwire.set(true);
        state_rx.wait_for(|s| *s == FlightState::Prepared).await.unwrap();
        probes.arm_switch.set(true);
        state_rx.wait_for(|s| *s == FlightState::Armed).await.unwrap();
        probes.breakwire.set(false);
        state_rx.wait_for(|s| *s == FlightState::Landed).await.unwrap();
        probes.arm_switch.set(false);
        probes
    });

    tokio::time::timeout(Duration::from_secs(10), seq.run()).await.unwrap().unwrap();
    let probes = operator.await.unwrap();
    assert_eq!(seq.state(), FlightState::Off);
    assert_eq!(probes.hatch.history().first(), Some(&FlightConfig::default().hatch_closed));
    assert_eq!(probes.hatch.last(), Some(hatch_open));
    assert!(seq.scheduler().is_stopped());
    for channel in ["baro", "acc", "gyro", "mag"] {
        assert!(seq.context().files().channel(channel).exists(), "{channel}");
    }
    seq.shutdown().await;
}
