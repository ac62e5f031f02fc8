use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Stamp format shared by every file of one flight, e.g. `19-10-26_14-03-59`.
const STAMP_FORMAT: &str = "%d-%m-%y_%H-%M-%S";

/// Paths of the log, configuration archive and sample stores of one flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightFiles {
    dir: PathBuf,
    stamp: String,
}

impl FlightFiles {
    pub fn new<P: AsRef<Path>>(dir: P, start: DateTime<Local>) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), stamp: start.format(STAMP_FORMAT).to_string() }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn stamp(&self) -> &str { &self.stamp }

    pub fn log(&self) -> PathBuf { self.dir.join(format!("{}.log", self.stamp)) }

    pub fn config(&self) -> PathBuf { self.dir.join(format!("{}_config.json", self.stamp)) }

    /// Sample store of one channel (`baro`, `acc`, `gyro`, `mag`).
    pub fn channel(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{}_{channel}.csv", self.stamp))
    }

    pub fn create_dir(&self) -> std::io::Result<()> { std::fs::create_dir_all(&self.dir) }
}
