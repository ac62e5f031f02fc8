use super::{DigitalInput, OutputPin, PeripheralError, ServoOutput};
use crate::{event, info, warn};
use itertools::Itertools;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Shared level of a [`SyntheticInput`], settable from tests or the console.
#[derive(Debug, Clone)]
pub struct InputHandle(Arc<AtomicBool>);

impl InputHandle {
    pub fn set(&self, active: bool) { self.0.store(active, Ordering::SeqCst); }

    pub fn get(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// Stand-in for an unconnected switch.
pub struct SyntheticInput {
    name: String,
    level: InputHandle,
}

impl SyntheticInput {
    pub fn new(name: &str, active: bool) -> Self {
        Self { name: name.to_string(), level: InputHandle(Arc::new(AtomicBool::new(active))) }
    }

    pub fn handle(&self) -> InputHandle { self.level.clone() }
}

impl DigitalInput for SyntheticInput {
    fn name(&self) -> &str { &self.name }

    fn is_active(&self) -> Result<bool, PeripheralError> { Ok(self.level.get()) }
}

/// Every level a [`SyntheticOutput`] was driven to.
#[derive(Debug, Clone, Default)]
pub struct OutputRecord(Arc<Mutex<Vec<bool>>>);

impl OutputRecord {
    pub fn history(&self) -> Vec<bool> { self.0.lock().map(|h| h.clone()).unwrap_or_default() }

    pub fn last(&self) -> Option<bool> { self.0.lock().ok().and_then(|h| h.last().copied()) }
}

/// Stand-in for an unconnected output pin, logging every call.
pub struct SyntheticOutput {
    name: String,
    record: OutputRecord,
}

impl SyntheticOutput {
    pub fn new(name: &str) -> Self { Self { name: name.to_string(), record: OutputRecord::default() } }

    pub fn record(&self) -> OutputRecord { self.record.clone() }
}

impl OutputPin for SyntheticOutput {
    fn name(&self) -> &str { &self.name }

    fn set(&mut self, on: bool) -> Result<(), PeripheralError> {
        event!("{} set to {on}", self.name);
        self.record.0.lock().map_err(|_| PeripheralError::Poisoned)?.push(on);
        Ok(())
    }
}

/// Every value a [`SyntheticServo`] was moved to.
#[derive(Debug, Clone, Default)]
pub struct ServoRecord(Arc<Mutex<Vec<f64>>>);

impl ServoRecord {
    pub fn history(&self) -> Vec<f64> { self.0.lock().map(|h| h.clone()).unwrap_or_default() }

    pub fn last(&self) -> Option<f64> { self.0.lock().ok().and_then(|h| h.last().copied()) }
}

pub struct SyntheticServo {
    name: String,
    record: ServoRecord,
}

impl SyntheticServo {
    pub fn new(name: &str) -> Self { Self { name: name.to_string(), record: ServoRecord::default() } }

    pub fn record(&self) -> ServoRecord { self.record.clone() }
}

impl ServoOutput for SyntheticServo {
    fn name(&self) -> &str { &self.name }

    fn set_value(&mut self, value: f64) -> Result<(), PeripheralError> {
        if !(-1.0..=1.0).contains(&value) {
            return Err(PeripheralError::OutOfRange(value));
        }
        info!("{} moved to {value}", self.name);
        self.record.0.lock().map_err(|_| PeripheralError::Poisoned)?.push(value);
        Ok(())
    }

    fn close(&mut self) { info!("{} detached", self.name); }
}

/// Parses a console line like `arm_switch on` or `breakwire 0`.
pub fn parse_command(line: &str) -> Option<(&str, bool)> {
    let mut words = line.split_whitespace();
    let name = words.next()?;
    let level = match words.next()?.to_lowercase().as_str() {
        "on" | "1" | "true" | "closed" => true,
        "off" | "0" | "false" | "open" => false,
        _ => return None,
    };
    words.next().is_none().then_some((name, level))
}

/// Drives synthetic inputs from stdin for bench dry-runs, until stdin closes.
pub async fn drive_from_stdin(inputs: HashMap<String, InputHandle>) {
    if inputs.is_empty() {
        return;
    }
    info!("Synthetic inputs on the console: {}", inputs.keys().sorted().join(", "));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Some((name, level)) => match inputs.get(name) {
                Some(handle) => {
                    handle.set(level);
                    info!("{name} set to {level} from the console");
                }
                None => warn!("No synthetic input named {name}"),
            },
            None => warn!("Cannot parse console command {line:?}, expected '<input> on|off'"),
        }
    }
}
