use super::{sample_store::PersistenceFailure, sensor_task::SensorTask};
use crate::config::FlightConfig;
use crate::flight_control::FlightState;
use crate::{info, warn};
use futures::future::join_all;
use itertools::Itertools;
use std::sync::Arc;
use strum_macros::Display;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Display)]
pub enum JoinFailure {
    /// The task was never spawned, so there is nothing to wait for.
    NeverStarted(&'static str),
    /// The task panicked or was aborted.
    Aborted(&'static str),
}

impl std::error::Error for JoinFailure {}

enum Slot {
    Pending(SensorTask),
    Running { name: &'static str, handle: JoinHandle<SensorTask> },
    Finished(SensorTask),
}

/// Outcome of [`Scheduler::stop_all`]. Failures are logged and collected, never
/// propagated.
#[derive(Debug, Default)]
pub struct StopSummary {
    pub rows_flushed: usize,
    pub persistence: Vec<PersistenceFailure>,
    pub joins: Vec<JoinFailure>,
}

/// Owns every sampling task and the stop signal they share.
pub struct Scheduler {
    slots: Vec<Slot>,
    c_tok: CancellationToken,
}

impl Default for Scheduler {
    fn default() -> Self { Self::new() }
}

impl Scheduler {
    pub fn new() -> Self { Self { slots: Vec::new(), c_tok: CancellationToken::new() } }

    pub fn add(&mut self, task: SensorTask) { self.slots.push(Slot::Pending(task)); }

    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn is_running(&self) -> bool {
        self.slots.iter().any(|s| matches!(s, Slot::Running { handle, .. } if !handle.is_finished()))
    }

    pub fn is_stopped(&self) -> bool { self.c_tok.is_cancelled() }

    /// Spawns every pending task. Tasks are never restarted once stopped.
    pub fn start_all(&mut self, state_rx: &watch::Receiver<FlightState>, config: &Arc<FlightConfig>) {
        if self.c_tok.is_cancelled() {
            warn!("Sampling was already stopped, not restarting it");
            return;
        }
        let slots = std::mem::take(&mut self.slots);
        self.slots = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Pending(task) => {
                    let name = task.name();
                    let handle =
                        tokio::spawn(task.run(state_rx.clone(), Arc::clone(config), self.c_tok.clone()));
                    Slot::Running { name, handle }
                }
                other => other,
            })
            .collect();
        info!("Started sampling {}", self.names().join(", "));
    }

    fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|s| match s {
            Slot::Pending(t) | Slot::Finished(t) => t.name(),
            Slot::Running { name, .. } => *name,
        })
    }

    /// Raises the stop signal, waits for every running task and flushes what
    /// each one still buffers. Tasks that never ran are reported and skipped.
    pub async fn stop_all(&mut self) -> StopSummary {
        self.c_tok.cancel();
        let mut summary = StopSummary::default();
        let mut stopped = Vec::new();
        let mut running = Vec::new();
        for slot in std::mem::take(&mut self.slots) {
            match slot {
                Slot::Pending(task) => {
                    summary.joins.push(JoinFailure::NeverStarted(task.name()));
                    stopped.push(task);
                }
                Slot::Finished(task) => stopped.push(task),
                Slot::Running { name, handle } => running.push((name, handle)),
            }
        }
        let (names, handles): (Vec<_>, Vec<_>) = running.into_iter().unzip();
        for (name, res) in names.into_iter().zip(join_all(handles).await) {
            match res {
                Ok(task) => stopped.push(task),
                Err(e) => {
                    warn!("Sampling task {name} ended abnormally: {e}");
                    summary.joins.push(JoinFailure::Aborted(name));
                }
            }
        }
        for mut task in stopped {
            match task.save() {
                Ok(n) => summary.rows_flushed += n,
                Err(e) => {
                    warn!("Saving the last {} data failed: {e}", task.name());
                    summary.persistence.push(e);
                }
            }
            self.slots.push(Slot::Finished(task));
        }
        for failure in &summary.joins {
            warn!("Joining a sampling task failed: {failure}");
        }
        info!("Sampling stopped, {} rows flushed in the final save", summary.rows_flushed);
        summary
    }

    /// Drops every task that is not running. Their devices power down on drop.
    pub fn release(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|s| matches!(s, Slot::Running { .. }));
        before - self.slots.len()
    }

    /// A stopped task, for inspection after `stop_all`.
    pub fn finished(&self, name: &str) -> Option<&SensorTask> {
        self.slots.iter().find_map(|s| match s {
            Slot::Finished(t) if t.name() == name => Some(t),
            _ => None,
        })
    }
}
