//! Digital inputs, the hatch servo, the buzzer and the status LED.
//!
//! Every device sits behind a small capability trait with a Linux sysfs
//! implementation and a synthetic stand-in. A pin left `null` in the
//! configuration selects the stand-in.

mod playback;
pub mod selftest;
mod signal;
mod synthetic;
mod sysfs;
#[cfg(test)]
mod tests;

pub use playback::{LevelSink, Pattern, Playback};
pub use signal::{Buzzer, Color, Hatch, HatchPosition, StatusLed};
pub use synthetic::{
    InputHandle, OutputRecord, ServoRecord, SyntheticInput, SyntheticOutput, SyntheticServo,
    drive_from_stdin,
};
pub use sysfs::{SysfsInput, SysfsOutput, SysfsServo};

use crate::config::{FlightConfig, secs};
use crate::info;
use std::{collections::HashMap, time::Duration};
use strum_macros::Display;
use tokio::time::Instant;

/// Poll period of the press/release waits.
const POLL_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Display)]
pub enum PeripheralError {
    Io(std::io::Error),
    /// Servo value outside `[-1, 1]`.
    OutOfRange(f64),
    /// A sysfs attribute held something other than a level.
    Malformed(String),
    /// A playback task panicked while holding its device.
    Poisoned,
}

impl std::error::Error for PeripheralError {}

impl From<std::io::Error> for PeripheralError {
    fn from(value: std::io::Error) -> Self { PeripheralError::Io(value) }
}

pub trait DigitalInput: Send + Sync {
    fn name(&self) -> &str;

    /// `true` while the switch is engaged or the loop is closed.
    fn is_active(&self) -> Result<bool, PeripheralError>;
}

pub trait OutputPin: Send {
    fn name(&self) -> &str;

    fn set(&mut self, on: bool) -> Result<(), PeripheralError>;

    /// Best-effort release, failures ignored.
    fn close(&mut self) { let _ = self.set(false); }
}

pub trait ServoOutput: Send {
    fn name(&self) -> &str;

    /// Moves to `value`, `-1.0` and `1.0` being the two end stops.
    fn set_value(&mut self, value: f64) -> Result<(), PeripheralError>;

    /// Best-effort detach, failures ignored.
    fn close(&mut self);
}

/// Waits until `input` reads `level`. Returns `false` on timeout.
pub async fn wait_for_level(
    input: &dyn DigitalInput,
    level: bool,
    timeout: Option<Duration>,
) -> Result<bool, PeripheralError> {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if input.is_active()? == level {
            return Ok(true);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(false);
        }
        tokio::time::sleep(POLL_PERIOD).await;
    }
}

pub async fn wait_for_press(input: &dyn DigitalInput, timeout: Option<Duration>) -> Result<bool, PeripheralError> {
    wait_for_level(input, true, timeout).await
}

pub async fn wait_for_release(input: &dyn DigitalInput, timeout: Option<Duration>) -> Result<bool, PeripheralError> {
    wait_for_level(input, false, timeout).await
}

/// Waits for one full off-on cycle of `input` (plus the final release if it
/// started released) within `timeout`.
pub async fn wait_for_toggle(input: &dyn DigitalInput, timeout: Duration) -> Result<bool, PeripheralError> {
    let deadline = Instant::now() + timeout;
    let remaining = || Some(deadline.saturating_duration_since(Instant::now()));
    let initial = input.is_active()?;
    if !wait_for_release(input, remaining()).await? || !wait_for_press(input, remaining()).await? {
        return Ok(false);
    }
    if !initial && !wait_for_release(input, remaining()).await? {
        return Ok(false);
    }
    Ok(true)
}

pub struct Inputs {
    pub arm_switch: Box<dyn DigitalInput>,
    pub breakwire: Box<dyn DigitalInput>,
}

impl Inputs {
    pub fn arm_switch(&self) -> Result<bool, PeripheralError> { self.arm_switch.is_active() }

    pub fn breakwire(&self) -> Result<bool, PeripheralError> { self.breakwire.is_active() }
}

pub struct Outputs {
    pub hatch: Hatch,
    pub buzzer: Buzzer,
    pub led: StatusLed,
}

impl Outputs {
    /// Best-effort release of every output. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.buzzer.close();
        self.led.close();
        self.hatch.release();
    }
}

impl Drop for Outputs {
    fn drop(&mut self) { self.close(); }
}

/// All peripherals of the flight computer, plus the console handles of every
/// input that got a synthetic stand-in.
pub struct Peripherals {
    pub inputs: Inputs,
    pub outputs: Outputs,
    pub console: HashMap<String, InputHandle>,
}

impl Peripherals {
    /// Opens every configured pin. Unconfigured pins get synthetic stand-ins.
    pub fn from_config(config: &FlightConfig) -> Result<Self, PeripheralError> {
        let pins = &config.pins;
        let mut console = HashMap::new();
        let mut input = |name: &str, pin: Option<u32>| -> Result<Box<dyn DigitalInput>, PeripheralError> {
            if let Some(pin) = pin {
                return Ok(Box::new(SysfsInput::open(name, pin)?));
            }
            info!("No pin for {name}, using a synthetic input");
            let synthetic = SyntheticInput::new(name, false);
            console.insert(name.to_string(), synthetic.handle());
            Ok(Box::new(synthetic))
        };
        let inputs =
            Inputs { arm_switch: input("arm_switch", pins.arm_switch)?, breakwire: input("breakwire", pins.breakwire)? };

        let output = |name: &str, pin: Option<u32>| -> Result<Box<dyn OutputPin>, PeripheralError> {
            let out: Box<dyn OutputPin> = match pin {
                Some(pin) => Box::new(SysfsOutput::open(name, pin)?),
                None => Box::new(SyntheticOutput::new(name)),
            };
            Ok(out)
        };
        let buzzer = output("buzzer", pins.buzzer)?;
        let led = if pins.status_led.iter().all(Option::is_some) {
            [
                output("status_led_r", pins.status_led[0])?,
                output("status_led_g", pins.status_led[1])?,
                output("status_led_b", pins.status_led[2])?,
            ]
        } else {
            [
                output("status_led_r", None)?,
                output("status_led_g", None)?,
                output("status_led_b", None)?,
            ]
        };
        let servo: Box<dyn ServoOutput> = match pins.hatch_pwm {
            Some(channel) => Box::new(SysfsServo::open("hatch", channel)?),
            None => Box::new(SyntheticServo::new("hatch")),
        };

        let outputs = Outputs {
            hatch: Hatch::new(servo, config.hatch_open, config.hatch_closed),
            buzzer: Buzzer::new(buzzer, secs(config.beep_period)),
            led: StatusLed::new(led, secs(config.blink_period)),
        };
        Ok(Self { inputs, outputs, console })
    }
}

/// Handles on every synthetic device of [`Peripherals::synthetic`].
#[cfg(test)]
pub(crate) struct Probes {
    pub arm_switch: InputHandle,
    pub breakwire: InputHandle,
    pub buzzer: OutputRecord,
    pub led: [OutputRecord; 3],
    pub hatch: ServoRecord,
}

#[cfg(test)]
impl Peripherals {
    pub(crate) fn synthetic(config: &FlightConfig) -> (Self, Probes) {
        let arm_switch = SyntheticInput::new("arm_switch", false);
        let breakwire = SyntheticInput::new("breakwire", false);
        let buzzer = SyntheticOutput::new("buzzer");
        let led = [SyntheticOutput::new("r"), SyntheticOutput::new("g"), SyntheticOutput::new("b")];
        let hatch = SyntheticServo::new("hatch");
        let probes = Probes {
            arm_switch: arm_switch.handle(),
            breakwire: breakwire.handle(),
            buzzer: buzzer.record(),
            led: [led[0].record(), led[1].record(), led[2].record()],
            hatch: hatch.record(),
        };
        let outputs = Outputs {
            hatch: Hatch::new(Box::new(hatch), config.hatch_open, config.hatch_closed),
            buzzer: Buzzer::new(Box::new(buzzer), secs(config.beep_period)),
            led: StatusLed::new(led.map(|p| Box::new(p) as Box<dyn OutputPin>), secs(config.blink_period)),
        };
        let inputs = Inputs { arm_switch: Box::new(arm_switch), breakwire: Box::new(breakwire) };
        (Self { inputs, outputs, console: HashMap::new() }, probes)
    }
}
