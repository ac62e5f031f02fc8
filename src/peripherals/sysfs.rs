use super::{DigitalInput, OutputPin, PeripheralError, ServoOutput};
use crate::log;
use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

const GPIO_ROOT: &str = "/sys/class/gpio";
const PWM_ROOT: &str = "/sys/class/pwm/pwmchip0";

/// Servo frame of 50 Hz, in ns.
const SERVO_PERIOD_NS: f64 = 20_000_000.0;
/// Pulse width of the servo center position, in ns.
const SERVO_CENTER_NS: f64 = 1_500_000.0;
/// Pulse width change from the center to either end stop, in ns.
const SERVO_SPAN_NS: f64 = 500_000.0;

/// Time udev needs to hand a freshly exported attribute over to us.
const EXPORT_SETTLE: Duration = Duration::from_millis(100);

/// Exports `index` under `root` unless it already is, returning its directory.
fn export(root: &Path, prefix: &str, index: u32) -> Result<PathBuf, PeripheralError> {
    let dir = root.join(format!("{prefix}{index}"));
    if !dir.exists() {
        fs::write(root.join("export"), index.to_string())?;
        thread::sleep(EXPORT_SETTLE);
    }
    Ok(dir)
}

fn read_level(path: &Path) -> Result<bool, PeripheralError> {
    match fs::read_to_string(path)?.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(PeripheralError::Malformed(other.to_string())),
    }
}

/// Switch input wired against ground with the internal pull-up, so a closed
/// switch reads low.
pub struct SysfsInput {
    name: String,
    value: PathBuf,
    active_low: bool,
}

impl SysfsInput {
    pub fn open(name: &str, pin: u32) -> Result<Self, PeripheralError> { Self::open_at(Path::new(GPIO_ROOT), name, pin) }

    pub fn open_at(root: &Path, name: &str, pin: u32) -> Result<Self, PeripheralError> {
        let dir = export(root, "gpio", pin)?;
        fs::write(dir.join("direction"), "in")?;
        log!("{name} reads GPIO {pin}");
        Ok(Self { name: name.to_string(), value: dir.join("value"), active_low: true })
    }
}

impl DigitalInput for SysfsInput {
    fn name(&self) -> &str { &self.name }

    fn is_active(&self) -> Result<bool, PeripheralError> { Ok(read_level(&self.value)? != self.active_low) }
}

pub struct SysfsOutput {
    name: String,
    value: PathBuf,
}

impl SysfsOutput {
    pub fn open(name: &str, pin: u32) -> Result<Self, PeripheralError> { Self::open_at(Path::new(GPIO_ROOT), name, pin) }

    pub fn open_at(root: &Path, name: &str, pin: u32) -> Result<Self, PeripheralError> {
        let dir = export(root, "gpio", pin)?;
        // "low" sets the direction and drives the pin low in one write
        fs::write(dir.join("direction"), "low")?;
        log!("{name} drives GPIO {pin}");
        Ok(Self { name: name.to_string(), value: dir.join("value") })
    }
}

impl OutputPin for SysfsOutput {
    fn name(&self) -> &str { &self.name }

    fn set(&mut self, on: bool) -> Result<(), PeripheralError> {
        fs::write(&self.value, if on { "1" } else { "0" })?;
        Ok(())
    }
}

/// Hobby servo on a hardware PWM channel.
pub struct SysfsServo {
    name: String,
    dir: PathBuf,
}

impl SysfsServo {
    pub fn open(name: &str, channel: u32) -> Result<Self, PeripheralError> {
        Self::open_at(Path::new(PWM_ROOT), name, channel)
    }

    pub fn open_at(root: &Path, name: &str, channel: u32) -> Result<Self, PeripheralError> {
        let dir = export(root, "pwm", channel)?;
        fs::write(dir.join("period"), format!("{SERVO_PERIOD_NS:.0}"))?;
        fs::write(dir.join("duty_cycle"), format!("{SERVO_CENTER_NS:.0}"))?;
        fs::write(dir.join("enable"), "1")?;
        log!("{name} on PWM channel {channel}");
        Ok(Self { name: name.to_string(), dir })
    }

    /// Pulse width in ns for a servo value in `[-1, 1]`.
    pub fn duty_cycle(value: f64) -> Result<u64, PeripheralError> {
        if !(-1.0..=1.0).contains(&value) {
            return Err(PeripheralError::OutOfRange(value));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ns = (SERVO_CENTER_NS + value * SERVO_SPAN_NS).round() as u64;
        Ok(ns)
    }
}

impl ServoOutput for SysfsServo {
    fn name(&self) -> &str { &self.name }

    fn set_value(&mut self, value: f64) -> Result<(), PeripheralError> {
        let ns = Self::duty_cycle(value)?;
        fs::write(self.dir.join("duty_cycle"), ns.to_string())?;
        Ok(())
    }

    fn close(&mut self) { let _ = fs::write(self.dir.join("enable"), "0"); }
}
