use super::{
    HardwareAbsentFault, Lis3mdl, Lps25h, Lsm6ds33, RegisterDevice, SensorError, SensorSuite,
    SuiteSources, raw_to_pascal,
};
use crate::bus::{LinuxI2c, RegisterBus};
use crate::config::CalibrationSamples;
use crate::log;
use std::time::Duration;

/// The three devices of the AltIMU-10 v5 board.
pub struct AltImu<B: RegisterBus> {
    lsm6ds33: Lsm6ds33<B>,
    lis3mdl: Lis3mdl<B>,
    lps25h: Lps25h<B>,
    enabled: bool,
    calibrated: bool,
}

impl AltImu<LinuxI2c> {
    /// Opens one bus handle per device and checks that every device answers.
    pub fn detect(bus_id: u8) -> Result<Self, HardwareAbsentFault> {
        let open = |device: &'static str| {
            LinuxI2c::open(bus_id).map_err(|e| HardwareAbsentFault { device, reason: e.to_string() })
        };
        let mut imu = Self::new(
            open(Lsm6ds33::<LinuxI2c>::NAME)?,
            open(Lis3mdl::<LinuxI2c>::NAME)?,
            open(Lps25h::<LinuxI2c>::NAME)?,
        );
        imu.probe()?;
        Ok(imu)
    }
}

impl<B: RegisterBus> AltImu<B> {
    pub fn new(imu_bus: B, mag_bus: B, baro_bus: B) -> Self {
        Self {
            lsm6ds33: Lsm6ds33::new(imu_bus),
            lis3mdl: Lis3mdl::new(mag_bus),
            lps25h: Lps25h::new(baro_bus),
            enabled: false,
            calibrated: false,
        }
    }

    pub fn probe(&mut self) -> Result<(), HardwareAbsentFault> {
        self.lsm6ds33.probe()?;
        self.lis3mdl.probe()?;
        self.lps25h.probe()
    }

    pub fn is_enabled(&self) -> bool { self.enabled }

    pub fn is_calibrated(&self) -> bool { self.calibrated }

    pub fn lsm6ds33(&mut self) -> &mut Lsm6ds33<B> { &mut self.lsm6ds33 }

    pub fn lps25h(&mut self) -> &mut Lps25h<B> { &mut self.lps25h }

    pub fn lis3mdl(&mut self) -> &mut Lis3mdl<B> { &mut self.lis3mdl }
}

impl<B: RegisterBus + 'static> SensorSuite for AltImu<B> {
    fn is_synthetic(&self) -> bool { false }

    fn enable(&mut self) -> Result<(), SensorError> {
        self.lsm6ds33.enable()?;
        self.lps25h.enable()?;
        self.lis3mdl.enable()?;
        self.enabled = true;
        Ok(())
    }

    fn calibrate(&mut self, samples: &CalibrationSamples, delay: Duration) -> Result<(), SensorError> {
        self.lsm6ds33.calibrate(samples.gyro, delay)?;
        let p0 = self.lps25h.calibrate(samples.baro, delay)?;
        log!("Gyro offset {:?}, ambient pressure {p0:.1} Pa", self.lsm6ds33.gyro_offset());
        self.calibrated = true;
        Ok(())
    }

    fn reference_pressure(&mut self, samples: usize) -> Result<f64, SensorError> {
        if samples == 0 {
            return Ok(self.lps25h.p0());
        }
        let mut sum = 0.0;
        for _ in 0..samples {
            sum += raw_to_pascal(self.lps25h.get_barometer_raw()?);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = samples as f64;
        Ok(sum / n)
    }

    fn into_sources(self: Box<Self>) -> SuiteSources {
        let AltImu { lsm6ds33, lis3mdl, lps25h, .. } = *self;
        SuiteSources { imu: Box::new(lsm6ds33), mag: Box::new(lis3mdl), baro: Box::new(lps25h) }
    }
}
