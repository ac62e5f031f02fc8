use super::PeripheralError;
use crate::warn;
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A device a [`Playback`] can drive to a level of type `L`.
pub trait LevelSink<L>: Send {
    fn apply(&mut self, level: L) -> Result<(), PeripheralError>;

    fn close(&mut self);
}

/// Explicit timed sequence of `(level, duration)` steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern<L> {
    steps: Vec<(L, Duration)>,
    repeat: bool,
}

impl<L: Copy> Pattern<L> {
    /// Plays `steps` once, then returns to the idle level.
    pub fn once(steps: Vec<(L, Duration)>) -> Self { Self { steps, repeat: false } }

    /// Plays `steps` until stopped. A loop without any duration plays once.
    pub fn looping(steps: Vec<(L, Duration)>) -> Self {
        let repeat = steps.iter().any(|(_, d)| !d.is_zero());
        Self { steps, repeat }
    }

    /// `n` times `on` for `on_time` followed by `off` for `off_time`.
    pub fn square(on: L, off: L, on_time: Duration, off_time: Duration, n: usize) -> Self {
        Self::once((0..n).flat_map(|_| [(on, on_time), (off, off_time)]).collect())
    }

    pub fn steps(&self) -> &[(L, Duration)] { &self.steps }

    pub fn repeats(&self) -> bool { self.repeat }

    /// Length of one pass.
    pub fn duration(&self) -> Duration { self.steps.iter().map(|(_, d)| *d).sum() }
}

fn apply<L>(sink: &Mutex<Box<dyn LevelSink<L>>>, level: L) -> Result<(), PeripheralError> {
    sink.lock().map_err(|_| PeripheralError::Poisoned)?.apply(level)
}

/// Plays [`Pattern`]s on one device from a dedicated task. Starting a new
/// pattern or setting a level stops the one playing.
pub struct Playback<L> {
    sink: Arc<Mutex<Box<dyn LevelSink<L>>>>,
    idle: L,
    current: Option<(JoinHandle<()>, CancellationToken)>,
}

impl<L: Copy + Debug + Send + Sync + 'static> Playback<L> {
    pub fn new(sink: Box<dyn LevelSink<L>>, idle: L) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)), idle, current: None }
    }

    /// Starts `pattern` in the background. Needs a running tokio runtime.
    pub fn play(&mut self, pattern: Pattern<L>) {
        self.abort();
        if pattern.steps.is_empty() {
            return;
        }
        let sink = Arc::clone(&self.sink);
        let idle = self.idle;
        let c_tok = CancellationToken::new();
        let task_tok = c_tok.clone();
        let handle = tokio::spawn(async move {
            loop {
                for (level, duration) in &pattern.steps {
                    if let Err(e) = apply(&sink, *level) {
                        warn!("Pattern aborted, setting {level:?} failed: {e}");
                        return;
                    }
                    tokio::select! {
                        () = task_tok.cancelled() => return,
                        () = tokio::time::sleep(*duration) => {}
                    }
                }
                if !pattern.repeat {
                    break;
                }
            }
            let _ = apply(&sink, idle);
        });
        self.current = Some((handle, c_tok));
    }

    pub fn is_playing(&self) -> bool { self.current.as_ref().is_some_and(|(h, _)| !h.is_finished()) }

    /// Stops any pattern and holds `level`.
    pub fn set(&mut self, level: L) -> Result<(), PeripheralError> {
        self.abort();
        apply(&self.sink, level)
    }

    pub fn stop(&mut self) -> Result<(), PeripheralError> { self.set(self.idle) }

    /// Waits until the current one-shot pattern has played out.
    pub async fn finish(&mut self) {
        if let Some((handle, _)) = self.current.take() {
            let _ = handle.await;
        }
    }

    /// Stops playback and releases the device.
    pub fn close(&mut self) {
        self.abort();
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.apply(self.idle);
            sink.close();
        }
    }

    fn abort(&mut self) {
        if let Some((handle, c_tok)) = self.current.take() {
            c_tok.cancel();
            handle.abort();
        }
    }
}

impl<L> Drop for Playback<L> {
    fn drop(&mut self) {
        if let Some((handle, c_tok)) = self.current.take() {
            c_tok.cancel();
            handle.abort();
        }
    }
}
