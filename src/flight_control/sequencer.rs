use super::{FlightContext, FlightState};
use crate::peripherals::{Color, Inputs, Outputs, PeripheralError};
use crate::sampling::{Scheduler, SensorTask};
use crate::sensors::{SensorError, SensorSuite, SuiteSources};
use crate::{event, info, log, warn};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use strum_macros::Display;
use tokio::{task::JoinError, time::Instant};

/// Result of one state machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The terminal state was reached, the control loop exits.
    Stop,
}

#[derive(Debug, Display)]
pub enum FlightError {
    Sensor(SensorError),
    Peripheral(PeripheralError),
    /// The calibration task panicked.
    Aborted(JoinError),
}

impl std::error::Error for FlightError {}

impl From<SensorError> for FlightError {
    fn from(value: SensorError) -> Self { FlightError::Sensor(value) }
}

impl From<PeripheralError> for FlightError {
    fn from(value: PeripheralError) -> Self { FlightError::Peripheral(value) }
}

impl From<JoinError> for FlightError {
    fn from(value: JoinError) -> Self { FlightError::Aborted(value) }
}

/// The deployment state machine.
///
/// One `tick` evaluates the current state once: its enter action fires when
/// `last_state` differs from `state`, then the transition conditions are
/// checked against the inputs and the latest navigation snapshot.
pub struct FlightSequencer {
    context: FlightContext,
    state: FlightState,
    last_state: FlightState,
    flight_start: Option<DateTime<Utc>>,
    /// Handed over to the sampling tasks on the first entry into `ARMED`.
    suite: Option<Box<dyn SensorSuite>>,
    scheduler: Scheduler,
    inputs: Inputs,
    outputs: Outputs,
}

impl FlightSequencer {
    pub fn new(context: FlightContext, suite: Box<dyn SensorSuite>, inputs: Inputs, outputs: Outputs) -> Self {
        context.publish_state(FlightState::Idle);
        Self {
            context,
            state: FlightState::Idle,
            last_state: FlightState::Off,
            flight_start: None,
            suite: Some(suite),
            scheduler: Scheduler::new(),
            inputs,
            outputs,
        }
    }

    pub fn state(&self) -> FlightState { self.state }

    pub fn last_state(&self) -> FlightState { self.last_state }

    pub fn context(&self) -> &FlightContext { &self.context }

    pub fn scheduler(&self) -> &Scheduler { &self.scheduler }

    pub fn outputs(&self) -> &Outputs { &self.outputs }

    /// Seconds since launch, zero before it.
    #[allow(clippy::cast_precision_loss)]
    fn elapsed(&self, now: DateTime<Utc>) -> f64 {
        self.flight_start.map_or(0.0, |start| (now - start).num_milliseconds() as f64 / 1000.0)
    }

    /// Enables and calibrates the sensor suite, seeds the estimator and starts
    /// sampling. Does nothing once the suite was handed over.
    async fn arm_sensors(&mut self) -> Result<(), FlightError> {
        let Some(mut suite) = self.suite.take() else {
            return Ok(());
        };
        let conf = Arc::clone(self.context.config());
        let cal_conf = Arc::clone(&conf);
        let (suite, p0) = tokio::task::spawn_blocking(move || -> Result<_, SensorError> {
            suite.enable()?;
            suite.calibrate(&cal_conf.calibration, cal_conf.calibration_delay())?;
            let p0 = suite.reference_pressure(cal_conf.calibration.p0)?;
            Ok((suite, p0))
        })
        .await??;
        self.context.estimator().write().await.seed(p0);
        log!("Sensor calibration finished, starting threads now");

        let SuiteSources { imu, mag, baro } = suite.into_sources();
        let files = self.context.files();
        let intervals = &conf.sensor_intervals;
        let save = conf.save_period();
        self.scheduler.add(
            SensorTask::new("baro", baro, files, intervals.baro, save).with_estimator(self.context.estimator()),
        );
        self.scheduler.add(SensorTask::new("imu", imu, files, intervals.imu, save));
        self.scheduler.add(SensorTask::new("mag", mag, files, intervals.mag, save));
        self.scheduler.start_all(&self.context.subscribe_state(), &conf);
        Ok(())
    }

    /// Runs one step of the state machine at wall-clock time `now`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, FlightError> {
        let conf = Arc::clone(self.context.config());
        let entering = self.last_state != self.state;
        match self.state {
            FlightState::Idle => {
                if entering {
                    self.outputs.hatch.close()?;
                    self.outputs.led.solid(Color::GREEN)?;
                    self.last_state = self.state;
                }
                if self.inputs.breakwire()? && !self.inputs.arm_switch()? {
                    self.outputs.buzzer.progress();
                    self.state = FlightState::Prepared;
                }
            }
            FlightState::Prepared => {
                if entering {
                    self.outputs.led.solid(Color::BLUE)?;
                    self.last_state = self.state;
                }
                if !self.inputs.breakwire()? {
                    self.outputs.buzzer.setback();
                    self.state = FlightState::Idle;
                } else if self.inputs.arm_switch()? {
                    self.outputs.buzzer.progress();
                    self.state = FlightState::Armed;
                }
            }
            FlightState::Armed => {
                if entering {
                    self.last_state = self.state;
                    if self.suite.is_some() {
                        self.outputs.led.blink(Color::BLUE, Color::OFF);
                        self.arm_sensors().await?;
                    }
                    self.outputs.led.solid(Color::RED)?;
                }
                if !self.inputs.arm_switch()? {
                    self.outputs.buzzer.setback();
                    self.state = FlightState::Prepared;
                } else if !self.inputs.breakwire()? {
                    self.outputs.buzzer.progress();
                    self.state = FlightState::Launched;
                }
            }
            FlightState::Launched => {
                if entering {
                    self.outputs.led.blink(Color::RED, Color::GREEN);
                    self.last_state = self.state;
                    self.flight_start = Some(now);
                }
                let t = self.elapsed(now);
                let nav = self.context.nav().await;
                let early = t >= conf.deploy_window[0]
                    && nav.altitude < conf.deploy_altitude
                    && nav.velocity < conf.deploy_velocity;
                if early || t >= conf.deploy_window[1] {
                    self.outputs.hatch.open()?;
                    self.outputs.buzzer.progress();
                    self.state = FlightState::Deployed;
                }
            }
            FlightState::Deployed => {
                if entering {
                    self.outputs.led.blink(Color::RED, Color::BLUE);
                    self.last_state = self.state;
                }
                let t = self.elapsed(now);
                let nav = self.context.nav().await;
                let within = |x: f64, [lo, hi]: [f64; 2]| lo < x && x < hi;
                let early = t >= conf.landing_window[0]
                    && within(nav.altitude, conf.landing_altitude_range)
                    && within(nav.velocity, conf.landing_velocity_range);
                if early || t >= conf.landing_window[1] {
                    self.outputs.buzzer.progress();
                    self.state = FlightState::Landed;
                }
            }
            FlightState::Landed => {
                if entering {
                    self.outputs.led.blink(Color::GREEN, Color::BLUE);
                    tokio::time::sleep(conf.settle_delay()).await;
                    self.scheduler.stop_all().await;
                    self.last_state = self.state;
                    self.outputs.led.solid(Color::WHITE)?;
                }
                if !self.inputs.arm_switch()? {
                    self.outputs.buzzer.progress();
                    self.state = FlightState::Off;
                    info!("{} to {}", self.last_state, self.state);
                    self.context.publish_state(self.state);
                    return Ok(TickOutcome::Stop);
                } else if !self.outputs.buzzer.is_playing() {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let apogee = self.context.nav().await.apogee.max(0.0) as u64;
                    self.outputs.buzzer.number(apogee);
                }
            }
            FlightState::Off => return Ok(TickOutcome::Stop),
            FlightState::Unknown => {
                warn!("State variable is {}, matching no existing state", self.state);
            }
        }
        if self.last_state != self.state {
            self.outputs.led.off()?;
            info!("{} to {}", self.last_state, self.state);
            self.context.publish_state(self.state);
        }
        Ok(TickOutcome::Continue)
    }

    /// Ticks at the state-scaled control period until the terminal state.
    pub async fn run(&mut self) -> Result<(), FlightError> {
        let conf = Arc::clone(self.context.config());
        self.outputs.buzzer.progress();
        loop {
            let start = Instant::now();
            if self.tick(Utc::now()).await? == TickOutcome::Stop {
                return Ok(());
            }
            if conf.testing {
                let nav = self.context.nav().await;
                event!("{}m and {}m/s", nav.altitude, nav.velocity);
            }
            tokio::time::sleep_until(start + conf.statemachine_period(self.state)).await;
        }
    }

    /// Stops any sampling still running, powers down the sensors and releases
    /// every output. Safe to call on every exit path, including after a
    /// failed `run`.
    pub async fn shutdown(&mut self) {
        if !self.scheduler.is_empty() && !self.scheduler.is_stopped() {
            self.scheduler.stop_all().await;
        }
        let mut released = self.scheduler.release();
        if self.suite.take().is_some() {
            released += 1;
        }
        log!("Released {released} sensor sources");
        if self.state == FlightState::Off {
            self.outputs.buzzer.finish().await;
        }
        self.outputs.close();
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: FlightState) { self.state = state; }
}
