use crate::flight_control::FlightState;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path, time::Duration};
use strum_macros::Display;

/// Default I2C bus of the Raspberry Pi header.
const DEFAULT_BUS_ID: u8 = 1;

#[derive(Debug, Display)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self { ConfigError::Io(value) }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self { ConfigError::Parse(value) }
}

/// Default sampling interval of every physical sensor, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorIntervals {
    pub baro: f64,
    pub imu: f64,
    pub mag: f64,
}

/// Number of samples drained by the pre-flight calibration routines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSamples {
    pub gyro: usize,
    pub baro: usize,
    /// Readings averaged into the estimator's reference pressure.
    pub p0: usize,
    /// Pause between two calibration reads, respecting the output data rate.
    pub delay: f64,
}

/// GPIO/PWM wiring. `None` selects the synthetic stand-in for that device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinMap {
    pub hatch_pwm: Option<u32>,
    pub buzzer: Option<u32>,
    pub status_led: [Option<u32>; 3],
    pub arm_switch: Option<u32>,
    pub breakwire: Option<u32>,
}

/// Configuration document of one flight, consumed read-only by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub name: String,
    pub testing: bool,
    pub bus_id: u8,
    pub data_dir: String,

    pub deploy_altitude: f64,
    pub deploy_velocity: f64,
    pub deploy_window: [f64; 2],
    pub landing_altitude_range: [f64; 2],
    pub landing_velocity_range: [f64; 2],
    pub landing_window: [f64; 2],
    pub landing_settle_delay: f64,

    pub p_smoothing: f64,
    pub v_smoothing: f64,
    #[serde(rename = "T0")]
    pub t0: f64,
    pub a: f64,
    #[serde(rename = "R")]
    pub r: f64,
    pub g0: f64,

    pub sensor_intervals: SensorIntervals,
    pub statemachine_interval: f64,
    pub state_interval_factors: HashMap<FlightState, f64>,
    pub save_interval: f64,
    pub calibration: CalibrationSamples,

    pub beep_period: f64,
    pub blink_period: f64,
    pub hatch_open: f64,
    pub hatch_closed: f64,
    pub pins: PinMap,
}

impl Default for FlightConfig {
    fn default() -> Self {
        let state_interval_factors = HashMap::from([
            (FlightState::Idle, 10.0),
            (FlightState::Prepared, 5.0),
            (FlightState::Armed, 2.0),
            (FlightState::Launched, 1.0),
            (FlightState::Deployed, 1.0),
            (FlightState::Landed, 5.0),
            (FlightState::Off, 10.0),
        ]);
        Self {
            name: "SRP Reimagined".to_string(),
            testing: false,
            bus_id: DEFAULT_BUS_ID,
            data_dir: "../data".to_string(),
            deploy_altitude: 1000.0,
            deploy_velocity: -1.0,
            deploy_window: [3.0, 12.0],
            landing_altitude_range: [-20.0, 20.0],
            landing_velocity_range: [-1.0, 1.0],
            landing_window: [20.0, 300.0],
            landing_settle_delay: 5.0,
            p_smoothing: 0.3,
            v_smoothing: 0.2,
            t0: 288.15,
            a: -0.0065,
            r: 287.053,
            g0: 9.80665,
            sensor_intervals: SensorIntervals { baro: 0.02, imu: 0.01, mag: 0.05 },
            statemachine_interval: 0.05,
            state_interval_factors,
            save_interval: 1.0,
            calibration: CalibrationSamples { gyro: 2000, baro: 2000, p0: 50, delay: 0.004 },
            beep_period: 0.2,
            blink_period: 0.5,
            hatch_open: 1.0,
            hatch_closed: -1.0,
            pins: PinMap::default(),
        }
    }
}

impl FlightConfig {
    /// Reads a JSON configuration document. Keys absent from the document keep
    /// their default value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the effective configuration next to the flight data.
    pub fn archive<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Multiplier applied to every polling period while in `state`.
    pub fn interval_factor(&self, state: FlightState) -> f64 {
        self.state_interval_factors.get(&state).copied().unwrap_or(1.0)
    }

    pub fn statemachine_period(&self, state: FlightState) -> Duration {
        secs(self.statemachine_interval * self.interval_factor(state))
    }

    pub fn calibration_delay(&self) -> Duration { secs(self.calibration.delay) }

    pub fn settle_delay(&self) -> Duration { secs(self.landing_settle_delay) }

    pub fn save_period(&self) -> Duration { secs(self.save_interval) }
}

/// Converts configuration seconds into a `Duration`, clamping negatives to zero.
pub fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}
