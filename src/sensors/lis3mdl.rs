use super::{DeviceCore, MAG, RawSample, RegisterDevice, RegisterGroup, SampleSource, SensorError};
use crate::bus::RegisterBus;

const WHO_AM_I: u8 = 0x0F;
const CTRL_REG1: u8 = 0x20;
const CTRL_REG2: u8 = 0x21;
const CTRL_REG3: u8 = 0x22;
const CTRL_REG4: u8 = 0x23;

const OUT_X_L: u8 = 0x28;
const OUT_X_H: u8 = 0x29;
const OUT_Y_L: u8 = 0x2A;
const OUT_Y_H: u8 = 0x2B;
const OUT_Z_L: u8 = 0x2C;
const OUT_Z_H: u8 = 0x2D;
const TEMP_OUT_L: u8 = 0x2E;
const TEMP_OUT_H: u8 = 0x2F;

const MAG_REGISTERS: RegisterGroup = &[OUT_X_L, OUT_X_H, OUT_Y_L, OUT_Y_H, OUT_Z_L, OUT_Z_H];
const TEMP_REGISTERS: RegisterGroup = &[TEMP_OUT_L, TEMP_OUT_H];

const DEFAULTS: &[(u8, u8)] = &[
    (CTRL_REG1, 0b1110_0010), // temperature on, ultra-high performance XY, 155 Hz
    (CTRL_REG2, 0b0000_0000), // +-4 gauss
    (CTRL_REG3, 0b0000_0000), // continuous conversion
    (CTRL_REG4, 0b0000_1100), // ultra-high performance Z
];

/// LIS3MDL magnetometer. Has no calibration routine.
pub struct Lis3mdl<B: RegisterBus> {
    core: DeviceCore<B>,
    mag_enabled: bool,
    temp_enabled: bool,
}

impl<B: RegisterBus> Lis3mdl<B> {
    pub fn new(bus: B) -> Self {
        Self { core: DeviceCore::new(bus, DEFAULTS), mag_enabled: false, temp_enabled: false }
    }

    pub fn get_magnetometer_raw(&mut self) -> Result<[i64; 3], SensorError> {
        if !self.mag_enabled {
            return Err(SensorError::NotEnabled(MAG));
        }
        let v = self.core.bus().read_vector(Self::ADDR, MAG_REGISTERS, 3)?;
        Ok([v[0], v[1], v[2]])
    }

    pub fn get_temperature_raw(&mut self) -> Result<i64, SensorError> {
        if !self.temp_enabled {
            return Err(SensorError::NotEnabled("lis3mdl temperature"));
        }
        Ok(self.core.bus().read_value(Self::ADDR, TEMP_REGISTERS)?)
    }
}

impl<B: RegisterBus> RegisterDevice for Lis3mdl<B> {
    type Bus = B;

    const NAME: &'static str = "LIS3MDL";
    const ADDR: u8 = 0x1e;
    const WHO_AM_I: (u8, u8) = (WHO_AM_I, 0x3D);
    const POWER_DOWN: &'static [(u8, u8)] = &[(CTRL_REG1, 0x00), (CTRL_REG3, 0x03)];
    const SHUTDOWN: &'static [(u8, u8)] = &[(CTRL_REG3, 0x03)];

    fn core(&mut self) -> &mut DeviceCore<B> { &mut self.core }

    fn mark_enabled(&mut self) {
        self.mag_enabled = true;
        self.temp_enabled = true;
    }
}

impl<B: RegisterBus> SampleSource for Lis3mdl<B> {
    fn channels(&self) -> &'static [&'static str] { &[MAG] }

    fn sample(&mut self) -> Result<Vec<RawSample>, SensorError> {
        Ok(vec![RawSample::Vector(self.get_magnetometer_raw()?)])
    }
}

impl<B: RegisterBus> Drop for Lis3mdl<B> {
    fn drop(&mut self) { self.shutdown(); }
}
