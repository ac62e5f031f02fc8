use crate::sensors::RawSample;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
use strum_macros::Display;

#[derive(Debug, Display)]
pub enum PersistenceFailure {
    /// The store was never opened because its sampling task never ran.
    NotOpened(PathBuf),
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::error::Error for PersistenceFailure {}

impl From<std::io::Error> for PersistenceFailure {
    fn from(value: std::io::Error) -> Self { PersistenceFailure::Io(value) }
}

impl From<csv::Error> for PersistenceFailure {
    fn from(value: csv::Error) -> Self { PersistenceFailure::Csv(value) }
}

/// Append-only CSV file of `(unix_timestamp, value...)` rows, without header.
pub struct SampleStore {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl SampleStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self { Self { path: path.as_ref().to_path_buf(), writer: None } }

    pub fn path(&self) -> &Path { &self.path }

    pub fn is_open(&self) -> bool { self.writer.is_some() }

    /// Opens the file in append mode. Opening twice keeps the first handle.
    pub fn open(&mut self) -> Result<(), PersistenceFailure> {
        if self.writer.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.writer = Some(csv::WriterBuilder::new().has_headers(false).from_writer(file));
        }
        Ok(())
    }

    /// Writes `rows` and flushes them to disk.
    pub fn write_rows(&mut self, rows: &[(f64, RawSample)]) -> Result<(), PersistenceFailure> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(PersistenceFailure::NotOpened(self.path.clone()));
        };
        for (ts, sample) in rows {
            let mut record = Vec::with_capacity(4);
            record.push(format!("{ts:.6}"));
            record.extend(sample.values().iter().map(i64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// In-memory rows of one channel plus the index up to which they are on disk.
pub struct SampleLog {
    channel: &'static str,
    rows: Vec<(f64, RawSample)>,
    saved: usize,
    store: SampleStore,
}

impl SampleLog {
    pub fn new<P: AsRef<Path>>(channel: &'static str, path: P) -> Self {
        Self { channel, rows: Vec::new(), saved: 0, store: SampleStore::new(path) }
    }

    pub fn channel(&self) -> &'static str { self.channel }

    pub fn rows(&self) -> &[(f64, RawSample)] { &self.rows }

    pub fn unsaved(&self) -> usize { self.rows.len() - self.saved }

    pub fn push(&mut self, ts: f64, sample: RawSample) { self.rows.push((ts, sample)); }

    pub fn open(&mut self) -> Result<(), PersistenceFailure> { self.store.open() }

    /// Persists every row past the cursor and advances it. Returns the number of
    /// rows written.
    pub fn save(&mut self) -> Result<usize, PersistenceFailure> {
        let pending = &self.rows[self.saved..];
        self.store.write_rows(pending)?;
        let written = pending.len();
        self.saved = self.rows.len();
        Ok(written)
    }
}
