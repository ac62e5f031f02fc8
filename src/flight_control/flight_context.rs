use super::{Estimator, FlightState, NavSnapshot};
use crate::config::FlightConfig;
use crate::util::FlightFiles;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// Shared state of one flight, handed to the sequencer.
///
/// The estimator is written by the barometer sampling task only, the flight
/// state is published by the sequencer only. Everything else gets read access
/// through the accessors below.
pub struct FlightContext {
    /// Effective configuration, read-only for the whole flight.
    config: Arc<FlightConfig>,
    /// Output paths of this flight.
    files: Arc<FlightFiles>,
    /// Navigation state fed by the barometer task.
    estimator: Arc<RwLock<Estimator>>,
    /// Broadcasts the authoritative flight state to every sampling task.
    state_tx: watch::Sender<FlightState>,
}

impl FlightContext {
    pub fn new(config: FlightConfig, files: FlightFiles) -> Self {
        let estimator = Arc::new(RwLock::new(Estimator::new(&config)));
        let (state_tx, _) = watch::channel(FlightState::Idle);
        Self { config: Arc::new(config), files: Arc::new(files), estimator, state_tx }
    }

    pub fn config(&self) -> &Arc<FlightConfig> { &self.config }

    pub fn files(&self) -> &Arc<FlightFiles> { &self.files }

    /// Writer handle, only ever passed on to the barometer sampling task.
    pub fn estimator(&self) -> Arc<RwLock<Estimator>> { Arc::clone(&self.estimator) }

    pub async fn nav(&self) -> NavSnapshot { self.estimator.read().await.snapshot() }

    pub fn subscribe_state(&self) -> watch::Receiver<FlightState> { self.state_tx.subscribe() }

    pub fn publish_state(&self, state: FlightState) { self.state_tx.send_replace(state); }

    pub fn state(&self) -> FlightState { *self.state_tx.borrow() }
}
