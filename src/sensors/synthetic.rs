use super::{
    ACC, BARO, GYRO, MAG, RawSample, SampleSource, SensorError, SensorSuite, SuiteSources,
    raw_to_pascal,
};
use crate::config::CalibrationSamples;
use crate::log;
use rand::random_range;
use std::time::Duration;

/// Raw LPS25H counts of standard sea level pressure.
const SEA_LEVEL_RAW: i64 = 4_150_272;
/// Noise of the synthetic barometer, about +-5 Pa.
const BARO_NOISE: i64 = 200;
/// Range of every synthetic vector axis.
const VECTOR_NOISE: i64 = 10;

#[derive(Debug, Clone, Copy)]
enum Shape {
    /// One scalar per channel around `center`.
    Scalar { center: i64, noise: i64 },
    /// One 3-axis vector per channel.
    Vector { noise: i64 },
}

/// Random-data replacement for an absent device.
pub struct SyntheticSource {
    channels: &'static [&'static str],
    shape: Shape,
}

impl SyntheticSource {
    pub fn barometer() -> Self {
        Self { channels: &[BARO], shape: Shape::Scalar { center: SEA_LEVEL_RAW, noise: BARO_NOISE } }
    }

    pub fn imu() -> Self { Self { channels: &[ACC, GYRO], shape: Shape::Vector { noise: VECTOR_NOISE } } }

    pub fn magnetometer() -> Self { Self { channels: &[MAG], shape: Shape::Vector { noise: VECTOR_NOISE } } }

    fn draw(&self) -> RawSample {
        match self.shape {
            Shape::Scalar { center, noise } => RawSample::Scalar(center + random_range(-noise..=noise)),
            Shape::Vector { noise } => RawSample::Vector([
                random_range(-noise..=noise),
                random_range(-noise..=noise),
                random_range(-noise..=noise),
            ]),
        }
    }
}

impl SampleSource for SyntheticSource {
    fn channels(&self) -> &'static [&'static str] { self.channels }

    fn sample(&mut self) -> Result<Vec<RawSample>, SensorError> {
        Ok(self.channels.iter().map(|_| self.draw()).collect())
    }
}

/// Sensor suite used when the AltIMU is not on the bus.
pub struct SyntheticSuite {
    baro: SyntheticSource,
}

impl SyntheticSuite {
    pub fn new() -> Self { Self { baro: SyntheticSource::barometer() } }
}

impl Default for SyntheticSuite {
    fn default() -> Self { Self::new() }
}

impl SensorSuite for SyntheticSuite {
    fn is_synthetic(&self) -> bool { true }

    fn enable(&mut self) -> Result<(), SensorError> {
        log!("Synthetic sensors need no enabling");
        Ok(())
    }

    fn calibrate(&mut self, _samples: &CalibrationSamples, _delay: Duration) -> Result<(), SensorError> {
        log!("Synthetic sensors need no calibration");
        Ok(())
    }

    fn reference_pressure(&mut self, samples: usize) -> Result<f64, SensorError> {
        let n = samples.max(1);
        let sum: f64 = (0..n)
            .map(|_| self.baro.draw().as_scalar().map_or(0.0, raw_to_pascal))
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / n as f64;
        Ok(mean)
    }

    fn into_sources(self: Box<Self>) -> SuiteSources {
        SuiteSources {
            imu: Box::new(SyntheticSource::imu()),
            mag: Box::new(SyntheticSource::magnetometer()),
            baro: Box::new(self.baro),
        }
    }
}
