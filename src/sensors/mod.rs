//! Drivers for the three devices of the Pololu AltIMU-10 v5 and the suite
//! aggregating them.
//!
//! Every driver is a [`RegisterDevice`]: a bus address, a register table
//! with default settings and a power-down pattern. The shared
//! enable/configure/shutdown sequence lives in the trait. Per-device
//! differences (enabled channels, calibration) stay in the variant.

mod alt_imu;
mod lis3mdl;
mod lps25h;
mod lsm6ds33;
mod synthetic;

pub use alt_imu::AltImu;
pub use lis3mdl::Lis3mdl;
pub use lps25h::{Lps25h, SEA_LEVEL_PA};
pub use lsm6ds33::Lsm6ds33;
pub use synthetic::{SyntheticSource, SyntheticSuite};

use crate::bus::{BusError, RegisterBus};
use crate::config::CalibrationSamples;
use std::{collections::BTreeMap, fmt, time::Duration};
use strum_macros::Display;

/// Sample channel names, also used as CSV file suffixes.
pub const BARO: &str = "baro";
pub const ACC: &str = "acc";
pub const GYRO: &str = "gyro";
pub const MAG: &str = "mag";

/// Registers for one reading, read low to high.
pub type RegisterGroup = &'static [u8];

/// Raw, unscaled reading of one channel, produced by one logical read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSample {
    Scalar(i64),
    Vector([i64; 3]),
}

impl RawSample {
    pub fn values(&self) -> &[i64] {
        match self {
            RawSample::Scalar(v) => std::slice::from_ref(v),
            RawSample::Vector(v) => v,
        }
    }

    pub fn as_scalar(&self) -> Option<i64> {
        match self {
            RawSample::Scalar(v) => Some(*v),
            RawSample::Vector(_) => None,
        }
    }
}

#[derive(Debug, Display)]
pub enum SensorError {
    Bus(BusError),
    /// A channel was read before its device was enabled.
    NotEnabled(&'static str),
}

impl std::error::Error for SensorError {}

impl From<BusError> for SensorError {
    fn from(value: BusError) -> Self { SensorError::Bus(value) }
}

/// An expected device did not answer on the bus at start-up.
#[derive(Debug)]
pub struct HardwareAbsentFault {
    pub device: &'static str,
    pub reason: String,
}

impl fmt::Display for HardwareAbsentFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not present on the bus: {}", self.device, self.reason)
    }
}

impl std::error::Error for HardwareAbsentFault {}

/// Register offset to configured byte. Iteration is in register order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSettings(BTreeMap<u8, u8>);

impl DeviceSettings {
    pub fn from_pairs(pairs: &[(u8, u8)]) -> Self { Self(pairs.iter().copied().collect()) }

    /// Overrides win, every register not mentioned in `overrides` keeps its value.
    pub fn merge(&mut self, overrides: &DeviceSettings) {
        self.0.extend(overrides.0.iter().map(|(r, v)| (*r, *v)));
    }

    pub fn get(&self, reg: u8) -> Option<u8> { self.0.get(&reg).copied() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ { self.0.iter().map(|(r, v)| (*r, *v)) }
}

/// Bus handle and current register settings shared by every driver.
pub struct DeviceCore<B> {
    bus: B,
    settings: DeviceSettings,
}

impl<B: RegisterBus> DeviceCore<B> {
    pub fn new(bus: B, defaults: &[(u8, u8)]) -> Self {
        Self { bus, settings: DeviceSettings::from_pairs(defaults) }
    }

    pub fn bus(&mut self) -> &mut B { &mut self.bus }

    pub fn settings(&self) -> &DeviceSettings { &self.settings }

    /// Writes the full settings map to the device, in register order.
    fn apply(&mut self, addr: u8) -> Result<(), BusError> {
        for (reg, value) in self.settings.iter() {
            self.bus.write_register(addr, reg, value)?;
        }
        Ok(())
    }
}

pub trait RegisterDevice {
    type Bus: RegisterBus;

    const NAME: &'static str;
    /// 7-bit bus address.
    const ADDR: u8;
    /// `(register, expected value)` identifying the device.
    const WHO_AM_I: (u8, u8);
    /// Written before the default settings on every `enable()`.
    const POWER_DOWN: &'static [(u8, u8)];
    /// Written on shutdown, failures ignored.
    const SHUTDOWN: &'static [(u8, u8)];

    fn core(&mut self) -> &mut DeviceCore<Self::Bus>;

    /// Raises the enabled flag of every channel the defaults activate.
    fn mark_enabled(&mut self);

    /// Merges `overrides` into the current settings and writes all of them.
    fn configure(&mut self, overrides: &DeviceSettings) -> Result<(), BusError> {
        let core = self.core();
        core.settings.merge(overrides);
        core.apply(Self::ADDR)
    }

    fn enable(&mut self) -> Result<(), BusError> {
        for (reg, value) in Self::POWER_DOWN {
            self.core().bus.write_register(Self::ADDR, *reg, *value)?;
        }
        self.configure(&DeviceSettings::default())?;
        self.mark_enabled();
        Ok(())
    }

    /// Best-effort power down.
    fn shutdown(&mut self) {
        for (reg, value) in Self::SHUTDOWN {
            let _ = self.core().bus.store_register(Self::ADDR, *reg, *value);
        }
    }

    fn probe(&mut self) -> Result<(), HardwareAbsentFault> {
        let (reg, expected) = Self::WHO_AM_I;
        match self.core().bus.read_register(Self::ADDR, reg) {
            Ok(id) if id == expected => Ok(()),
            Ok(id) => Err(HardwareAbsentFault {
                device: Self::NAME,
                reason: format!("WHO_AM_I {id:#04x}, expected {expected:#04x}"),
            }),
            Err(e) => Err(HardwareAbsentFault { device: Self::NAME, reason: e.to_string() }),
        }
    }
}

/// Something a sampling task can poll: one or more channels per read.
pub trait SampleSource: Send {
    /// Channel names, in the order `sample()` returns them.
    fn channels(&self) -> &'static [&'static str];

    fn sample(&mut self) -> Result<Vec<RawSample>, SensorError>;
}

/// Per-device sample sources handed to the sampling tasks after arming.
pub struct SuiteSources {
    pub imu: Box<dyn SampleSource>,
    pub mag: Box<dyn SampleSource>,
    pub baro: Box<dyn SampleSource>,
}

/// Uniform pre-flight lifecycle over all sensor devices.
pub trait SensorSuite: Send {
    fn is_synthetic(&self) -> bool;

    fn enable(&mut self) -> Result<(), SensorError>;

    fn calibrate(&mut self, samples: &CalibrationSamples, delay: Duration) -> Result<(), SensorError>;

    /// Mean of `samples` pressure readings, in Pa (`raw / 40.96`).
    fn reference_pressure(&mut self, samples: usize) -> Result<f64, SensorError>;

    fn into_sources(self: Box<Self>) -> SuiteSources;
}

/// Raw LPS25H counts to Pa.
pub fn raw_to_pascal(raw: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let raw = raw as f64;
    raw / 40.96
}
