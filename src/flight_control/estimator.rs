use crate::config::FlightConfig;
use crate::sensors::raw_to_pascal;

/// International standard atmosphere constants of the barometric formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atmosphere {
    /// Base temperature in K.
    pub t0: f64,
    /// Temperature lapse rate in K/m.
    pub a: f64,
    /// Specific gas constant of air in J/(kg K).
    pub r: f64,
    /// Gravitational acceleration in m/s^2.
    pub g0: f64,
}

impl Atmosphere {
    pub fn from_config(config: &FlightConfig) -> Self {
        Self { t0: config.t0, a: config.a, r: config.r, g0: config.g0 }
    }

    /// Altitude of pressure `p` above the level of reference pressure `p0`.
    pub fn altitude(&self, p: f64, p0: f64) -> f64 {
        self.t0 / self.a * ((p / p0).powf(-self.r * self.a / self.g0) - 1.0)
    }
}

/// Values the sequencer decides on, copied out of the estimator in one read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NavSnapshot {
    pub altitude: f64,
    pub velocity: f64,
    pub apogee: f64,
}

/// Smoothed pressure, altitude and vertical velocity of the current flight.
///
/// Every history holds `[previous, current]`. Only the barometer sampling task
/// calls [`Estimator::update`].
#[derive(Debug, Clone)]
pub struct Estimator {
    p: [f64; 2],
    h: [f64; 2],
    v: [f64; 2],
    apogee: f64,
    p0: f64,
    p_smoothing: f64,
    v_smoothing: f64,
    atmosphere: Atmosphere,
}

impl Estimator {
    pub fn new(config: &FlightConfig) -> Self {
        let p0 = crate::sensors::SEA_LEVEL_PA;
        Self {
            p: [p0; 2],
            h: [0.0; 2],
            v: [0.0; 2],
            apogee: 0.0,
            p0,
            p_smoothing: config.p_smoothing,
            v_smoothing: config.v_smoothing,
            atmosphere: Atmosphere::from_config(config),
        }
    }

    /// Sets the ground reference pressure and fills the pressure history with it.
    pub fn seed(&mut self, p0: f64) {
        self.p0 = p0;
        self.p = [p0; 2];
    }

    /// Folds one raw barometer reading, taken `interval` seconds after the
    /// previous one, into the history.
    pub fn update(&mut self, raw_pressure: i64, interval: f64) -> NavSnapshot {
        let ps = self.p_smoothing;
        let p_next = ps * raw_to_pascal(raw_pressure) + (1.0 - ps) * self.p[1];
        self.p = [self.p[1], p_next];

        let h_next = self.atmosphere.altitude(p_next, self.p0);
        self.h = [self.h[1], h_next];

        let v_next = if interval > 0.0 {
            let vs = self.v_smoothing;
            vs * (self.h[1] - self.h[0]) / interval + (1.0 - vs) * self.v[1]
        } else {
            self.v[1]
        };
        self.v = [self.v[1], v_next];

        if h_next >= self.apogee {
            self.apogee = h_next;
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> NavSnapshot {
        NavSnapshot { altitude: self.h[1], velocity: self.v[1], apogee: self.apogee }
    }

    pub fn p0(&self) -> f64 { self.p0 }

    pub fn pressure(&self) -> f64 { self.p[1] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::random_range;

    /// Raw LPS25H counts for a pressure in Pa.
    fn raw(p: f64) -> i64 {
        #[allow(clippy::cast_possible_truncation)]
        let counts = (p * 40.96).round() as i64;
        counts
    }

    #[test]
    fn sea_level_is_zero_altitude() {
        let atmosphere = Atmosphere::from_config(&FlightConfig::default());
        assert!(atmosphere.altitude(101_325.0, 101_325.0).abs() < 1e-9);
        // roughly 111 m for the first 1300 Pa
        let h = atmosphere.altitude(100_000.0, 101_325.0);
        assert!((h - 110.9).abs() < 1.0, "{h}");
    }

    #[test]
    fn steady_ground_pressure_stays_at_zero() {
        let mut est = Estimator::new(&FlightConfig::default());
        est.seed(101_325.0);
        for _ in 0..100 {
            let nav = est.update(raw(101_325.0), 0.02);
            assert!(nav.altitude.abs() < 1e-3);
            assert!(nav.velocity.abs() < 1e-3);
        }
    }

    #[test]
    fn apogee_is_running_maximum() {
        let mut est = Estimator::new(&FlightConfig::default());
        est.seed(101_325.0);
        let mut highest = f64::MIN;
        let mut last_apogee = 0.0;
        for _ in 0..500 {
            let nav = est.update(raw(random_range(95_000.0..101_500.0)), 0.02);
            highest = highest.max(nav.altitude);
            assert!(nav.apogee >= last_apogee);
            assert!((nav.apogee - highest.max(0.0)).abs() < 1e-9);
            last_apogee = nav.apogee;
        }
    }

    #[test]
    fn climbing_gives_positive_velocity() {
        let mut est = Estimator::new(&FlightConfig::default());
        est.seed(101_325.0);
        let mut p = 101_325.0;
        for _ in 0..50 {
            p -= 50.0;
            est.update(raw(p), 0.02);
        }
        let nav = est.snapshot();
        assert!(nav.altitude > 0.0);
        assert!(nav.velocity > 0.0);
    }

    #[test]
    fn zero_interval_keeps_velocity() {
        let mut est = Estimator::new(&FlightConfig::default());
        est.seed(101_325.0);
        est.update(raw(100_000.0), 0.02);
        let v = est.snapshot().velocity;
        let nav = est.update(raw(99_000.0), 0.0);
        assert!((nav.velocity - v).abs() < f64::EPSILON);
    }
}
