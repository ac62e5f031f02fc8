//! Per-sensor sampling tasks and the scheduler owning them.
//!
//! Each task polls one physical device at `default_interval` scaled by the
//! factor of the current flight state, buffers every row in memory and
//! appends the unsaved part to its CSV store once per save interval.

mod sample_store;
mod scheduler;
mod sensor_task;

pub use scheduler::Scheduler;
pub use sensor_task::SensorTask;
