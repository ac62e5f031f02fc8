use super::{
    BARO, DeviceCore, RawSample, RegisterDevice, RegisterGroup, SampleSource, SensorError,
    raw_to_pascal,
};
use crate::bus::RegisterBus;
use std::time::Duration;

const WHO_AM_I: u8 = 0x0F;
const CTRL_REG1: u8 = 0x20;
const CTRL_REG2: u8 = 0x21;
const CTRL_REG3: u8 = 0x22;
const CTRL_REG4: u8 = 0x23;

const PRESS_OUT_XL: u8 = 0x28;
const PRESS_OUT_L: u8 = 0x29;
const PRESS_OUT_H: u8 = 0x2A;
const TEMP_OUT_L: u8 = 0x2B;
const TEMP_OUT_H: u8 = 0x2C;

const BARO_REGISTERS: RegisterGroup = &[PRESS_OUT_XL, PRESS_OUT_L, PRESS_OUT_H];
const TEMP_REGISTERS: RegisterGroup = &[TEMP_OUT_L, TEMP_OUT_H];

const DEFAULTS: &[(u8, u8)] = &[
    (CTRL_REG1, 0b1011_0000), // active, 12.5 Hz
    (CTRL_REG2, 0b0000_0000),
    (CTRL_REG3, 0b0000_0000),
    (CTRL_REG4, 0b0000_0000),
];

/// Standard sea level pressure, the starting guess of the reference average.
pub const SEA_LEVEL_PA: f64 = 101_325.0;

/// Weight of the running reference in the calibration average.
const P0_KEEP: f64 = 0.95;

/// LPS25H barometer.
pub struct Lps25h<B: RegisterBus> {
    core: DeviceCore<B>,
    baro_enabled: bool,
    temp_enabled: bool,
    p0: f64,
}

impl<B: RegisterBus> Lps25h<B> {
    pub fn new(bus: B) -> Self {
        Self { core: DeviceCore::new(bus, DEFAULTS), baro_enabled: false, temp_enabled: false, p0: SEA_LEVEL_PA }
    }

    /// Ambient pressure in Pa established by `calibrate`.
    pub fn p0(&self) -> f64 { self.p0 }

    pub fn get_barometer_raw(&mut self) -> Result<i64, SensorError> {
        if !self.baro_enabled {
            return Err(SensorError::NotEnabled(BARO));
        }
        Ok(self.core.bus().read_value(Self::ADDR, BARO_REGISTERS)?)
    }

    pub fn get_temperature_raw(&mut self) -> Result<i64, SensorError> {
        if !self.temp_enabled {
            return Err(SensorError::NotEnabled("lps25h temperature"));
        }
        Ok(self.core.bus().read_value(Self::ADDR, TEMP_REGISTERS)?)
    }

    /// Exponentially averages `samples` pressure readings into `p0`.
    pub fn calibrate(&mut self, samples: usize, delay: Duration) -> Result<f64, SensorError> {
        for _ in 0..samples {
            let p = raw_to_pascal(self.get_barometer_raw()?);
            self.p0 = P0_KEEP * self.p0 + (1.0 - P0_KEEP) * p;
            std::thread::sleep(delay);
        }
        Ok(self.p0)
    }
}

impl<B: RegisterBus> RegisterDevice for Lps25h<B> {
    type Bus = B;

    const NAME: &'static str = "LPS25H";
    const ADDR: u8 = 0x5d;
    const WHO_AM_I: (u8, u8) = (WHO_AM_I, 0xBD);
    const POWER_DOWN: &'static [(u8, u8)] = &[(CTRL_REG1, 0x00)];
    const SHUTDOWN: &'static [(u8, u8)] = &[(CTRL_REG1, 0x00)];

    fn core(&mut self) -> &mut DeviceCore<B> { &mut self.core }

    fn mark_enabled(&mut self) {
        self.baro_enabled = true;
        self.temp_enabled = true;
    }
}

impl<B: RegisterBus> SampleSource for Lps25h<B> {
    fn channels(&self) -> &'static [&'static str] { &[BARO] }

    fn sample(&mut self) -> Result<Vec<RawSample>, SensorError> {
        Ok(vec![RawSample::Scalar(self.get_barometer_raw()?)])
    }
}

impl<B: RegisterBus> Drop for Lps25h<B> {
    fn drop(&mut self) { self.shutdown(); }
}
