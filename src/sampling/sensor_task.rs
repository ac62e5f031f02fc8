use super::sample_store::{PersistenceFailure, SampleLog};
use crate::config::{FlightConfig, secs};
use crate::flight_control::{Estimator, FlightState};
use crate::sensors::{RawSample, SampleSource};
use crate::util::FlightFiles;
use crate::warn;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{RwLock, watch},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

/// One physical sensor polled in its own task.
pub struct SensorTask {
    name: &'static str,
    source: Box<dyn SampleSource>,
    /// One log per channel, in the order `source.sample()` returns them.
    logs: Vec<SampleLog>,
    /// Interval in seconds before state scaling.
    default_interval: f64,
    save_interval: Duration,
    /// Set for the barometer task only.
    estimator: Option<Arc<RwLock<Estimator>>>,
}

impl SensorTask {
    pub fn new(
        name: &'static str,
        source: Box<dyn SampleSource>,
        files: &FlightFiles,
        default_interval: f64,
        save_interval: Duration,
    ) -> Self {
        let logs = source.channels().iter().map(|&c| SampleLog::new(c, files.channel(c))).collect();
        Self { name, source, logs, default_interval, save_interval, estimator: None }
    }

    /// Makes this task the single writer of the navigation state.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Arc<RwLock<Estimator>>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    pub fn name(&self) -> &'static str { self.name }

    pub fn log(&self, channel: &str) -> Option<&SampleLog> {
        self.logs.iter().find(|l| l.channel() == channel)
    }

    /// Current polling interval in seconds, scaled for `state`.
    pub fn interval(&self, state: FlightState, config: &FlightConfig) -> f64 {
        self.default_interval * config.interval_factor(state)
    }

    /// Writes every unsaved row of every channel. Returns the rows written.
    pub fn save(&mut self) -> Result<usize, PersistenceFailure> {
        let mut written = 0;
        for log in &mut self.logs {
            written += log.save()?;
        }
        Ok(written)
    }

    /// Reads one sample of every channel. The barometer task also folds the
    /// reading into the estimator.
    async fn read(&mut self, interval: f64) {
        #[allow(clippy::cast_precision_loss)]
        let ts = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        let samples = match self.source.sample() {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Reading {} failed: {e}", self.name);
                return;
            }
        };
        for (log, sample) in self.logs.iter_mut().zip(&samples) {
            log.push(ts, *sample);
        }
        if let Some(estimator) = &self.estimator {
            if let Some(raw) = samples.first().and_then(RawSample::as_scalar) {
                estimator.write().await.update(raw, interval);
            }
        }
    }

    /// Samples until `c_tok` is cancelled, then hands the task back for the
    /// final flush.
    pub async fn run(
        mut self,
        state_rx: watch::Receiver<FlightState>,
        config: Arc<FlightConfig>,
        c_tok: CancellationToken,
    ) -> Self {
        for log in &mut self.logs {
            if let Err(e) = log.open() {
                warn!("Opening the {} store failed: {e}", log.channel());
            }
        }
        let mut next_save = Instant::now() + self.save_interval;
        while !c_tok.is_cancelled() {
            let start = Instant::now();
            let state = *state_rx.borrow();
            let interval = self.interval(state, &config);
            self.read(interval).await;
            if Instant::now() >= next_save {
                if let Err(e) = self.save() {
                    warn!("Saving {} failed: {e}", self.name);
                }
                next_save += self.save_interval;
            }
            let remaining = secs(interval).saturating_sub(start.elapsed());
            tokio::select! {
                () = c_tok.cancelled() => break,
                () = tokio::time::sleep(remaining) => {}
            }
        }
        self
    }
}
