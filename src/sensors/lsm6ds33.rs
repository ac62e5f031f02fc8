use super::{
    ACC, DeviceCore, GYRO, RawSample, RegisterDevice, RegisterGroup, SampleSource, SensorError,
};
use crate::bus::RegisterBus;
use std::time::Duration;

const FIFO_CTRL5: u8 = 0x0A;
const WHO_AM_I: u8 = 0x0F;
const CTRL1_XL: u8 = 0x10;
const CTRL2_G: u8 = 0x11;
const CTRL6_C: u8 = 0x15;
const CTRL7_G: u8 = 0x16;

const OUT_TEMP_L: u8 = 0x20;
const OUT_TEMP_H: u8 = 0x21;
const OUTX_L_G: u8 = 0x22;
const OUTX_H_G: u8 = 0x23;
const OUTY_L_G: u8 = 0x24;
const OUTY_H_G: u8 = 0x25;
const OUTZ_L_G: u8 = 0x26;
const OUTZ_H_G: u8 = 0x27;
const OUTX_L_XL: u8 = 0x28;
const OUTX_H_XL: u8 = 0x29;
const OUTY_L_XL: u8 = 0x2A;
const OUTY_H_XL: u8 = 0x2B;
const OUTZ_L_XL: u8 = 0x2C;
const OUTZ_H_XL: u8 = 0x2D;

const GYRO_REGISTERS: RegisterGroup = &[OUTX_L_G, OUTX_H_G, OUTY_L_G, OUTY_H_G, OUTZ_L_G, OUTZ_H_G];
const ACC_REGISTERS: RegisterGroup =
    &[OUTX_L_XL, OUTX_H_XL, OUTY_L_XL, OUTY_H_XL, OUTZ_L_XL, OUTZ_H_XL];
const TEMP_REGISTERS: RegisterGroup = &[OUT_TEMP_L, OUT_TEMP_H];

const DEFAULTS: &[(u8, u8)] = &[
    (FIFO_CTRL5, 0b0000_0000),
    (CTRL1_XL, 0b0101_0100), // 208 Hz, +-16 g
    (CTRL2_G, 0b0101_0100),  // 208 Hz, +-500 dps
    (CTRL6_C, 0b0000_0000),
    (CTRL7_G, 0b0000_0000),
];

/// LSM6DS33 accelerometer and gyroscope.
pub struct Lsm6ds33<B: RegisterBus> {
    core: DeviceCore<B>,
    gyro_enabled: bool,
    acc_enabled: bool,
    temp_enabled: bool,
    gyro_offset: Option<[f64; 3]>,
}

impl<B: RegisterBus> Lsm6ds33<B> {
    pub fn new(bus: B) -> Self {
        Self {
            core: DeviceCore::new(bus, DEFAULTS),
            gyro_enabled: false,
            acc_enabled: false,
            temp_enabled: false,
            gyro_offset: None,
        }
    }

    pub fn gyro_offset(&self) -> Option<[f64; 3]> { self.gyro_offset }

    fn gyro_uncorrected(&mut self) -> Result<[i64; 3], SensorError> {
        if !self.gyro_enabled {
            return Err(SensorError::NotEnabled(GYRO));
        }
        let v = self.core.bus().read_vector(Self::ADDR, GYRO_REGISTERS, 3)?;
        Ok([v[0], v[1], v[2]])
    }

    /// Gyro reading with the calibrated bias removed, once there is one.
    pub fn get_gyroscope_raw(&mut self) -> Result<[i64; 3], SensorError> {
        let mut raw = self.gyro_uncorrected()?;
        if let Some(offset) = self.gyro_offset {
            for (axis, off) in raw.iter_mut().zip(offset) {
                #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
                let corrected = (*axis as f64 - off).round() as i64;
                *axis = corrected;
            }
        }
        Ok(raw)
    }

    pub fn get_accelerometer_raw(&mut self) -> Result<[i64; 3], SensorError> {
        if !self.acc_enabled {
            return Err(SensorError::NotEnabled(ACC));
        }
        let v = self.core.bus().read_vector(Self::ADDR, ACC_REGISTERS, 3)?;
        Ok([v[0], v[1], v[2]])
    }

    pub fn get_temperature_raw(&mut self) -> Result<i64, SensorError> {
        if !self.temp_enabled {
            return Err(SensorError::NotEnabled("lsm6ds33 temperature"));
        }
        Ok(self.core.bus().read_value(Self::ADDR, TEMP_REGISTERS)?)
    }

    /// Averages `samples` gyro readings into the per-axis bias.
    pub fn calibrate(&mut self, samples: usize, delay: Duration) -> Result<(), SensorError> {
        if samples == 0 {
            return Ok(());
        }
        let mut sum = [0i64; 3];
        for _ in 0..samples {
            let raw = self.gyro_uncorrected()?;
            for (s, r) in sum.iter_mut().zip(raw) {
                *s += r;
            }
            std::thread::sleep(delay);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = samples as f64;
        #[allow(clippy::cast_precision_loss)]
        let mean = sum.map(|s| s as f64 / n);
        self.gyro_offset = Some(mean);
        Ok(())
    }
}

impl<B: RegisterBus> RegisterDevice for Lsm6ds33<B> {
    type Bus = B;

    const NAME: &'static str = "LSM6DS33";
    const ADDR: u8 = 0x6b;
    const WHO_AM_I: (u8, u8) = (WHO_AM_I, 0x69);
    const POWER_DOWN: &'static [(u8, u8)] = &[(CTRL1_XL, 0x00)];
    const SHUTDOWN: &'static [(u8, u8)] = &[(CTRL1_XL, 0x00), (CTRL2_G, 0x00)];

    fn core(&mut self) -> &mut DeviceCore<B> { &mut self.core }

    fn mark_enabled(&mut self) {
        self.gyro_enabled = true;
        self.acc_enabled = true;
        self.temp_enabled = true;
    }
}

impl<B: RegisterBus> SampleSource for Lsm6ds33<B> {
    fn channels(&self) -> &'static [&'static str] { &[ACC, GYRO] }

    fn sample(&mut self) -> Result<Vec<RawSample>, SensorError> {
        let acc = self.get_accelerometer_raw()?;
        let gyro = self.get_gyroscope_raw()?;
        Ok(vec![RawSample::Vector(acc), RawSample::Vector(gyro)])
    }
}

impl<B: RegisterBus> Drop for Lsm6ds33<B> {
    fn drop(&mut self) { self.shutdown(); }
}
