use super::{LevelSink, OutputPin, Pattern, PeripheralError, Playback, ServoOutput};
use crate::info;
use std::time::Duration;

/// Length of a `1` bit in a number report.
const DOT: Duration = Duration::from_millis(300);
/// Length of a `0` bit in a number report.
const DASH: Duration = Duration::from_millis(600);
/// Silence after every number report.
const REPORT_PAUSE: Duration = Duration::from_secs(5);

struct PinSink(Box<dyn OutputPin>);

impl LevelSink<bool> for PinSink {
    fn apply(&mut self, level: bool) -> Result<(), PeripheralError> { self.0.set(level) }

    fn close(&mut self) { self.0.close(); }
}

/// Audible status signals.
pub struct Buzzer {
    playback: Playback<bool>,
    period: Duration,
}

impl Buzzer {
    pub fn new(pin: Box<dyn OutputPin>, period: Duration) -> Self {
        Self { playback: Playback::new(Box::new(PinSink(pin)), false), period }
    }

    /// Two short beeps.
    pub fn progress_pattern(period: Duration) -> Pattern<bool> {
        Pattern::square(true, false, period / 2, period / 2, 2)
    }

    /// One long beep.
    pub fn setback_pattern(period: Duration) -> Pattern<bool> {
        Pattern::square(true, false, period * 3 / 2, period / 2, 1)
    }

    /// `n` in binary, most significant bit first: a `1` is a dot, a `0` a dash,
    /// every bit followed by a dot of silence. Ends with a long pause.
    pub fn number_pattern(n: u64) -> Pattern<bool> {
        let bits = format!("{n:b}");
        let mut steps: Vec<(bool, Duration)> = bits
            .chars()
            .flat_map(|b| [(true, if b == '1' { DOT } else { DASH }), (false, DOT)])
            .collect();
        steps.push((false, REPORT_PAUSE));
        Pattern::once(steps)
    }

    pub fn progress(&mut self) { self.playback.play(Self::progress_pattern(self.period)); }

    pub fn setback(&mut self) { self.playback.play(Self::setback_pattern(self.period)); }

    pub fn number(&mut self, n: u64) { self.playback.play(Self::number_pattern(n)); }

    pub fn beep(&mut self, on: Duration, off: Duration, n: usize) {
        self.playback.play(Pattern::square(true, false, on, off, n));
    }

    pub fn is_playing(&self) -> bool { self.playback.is_playing() }

    pub async fn finish(&mut self) { self.playback.finish().await; }

    pub fn close(&mut self) { self.playback.close(); }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: bool,
    pub g: bool,
    pub b: bool,
}

impl Color {
    pub const OFF: Color = Color { r: false, g: false, b: false };
    pub const RED: Color = Color { r: true, g: false, b: false };
    pub const GREEN: Color = Color { r: false, g: true, b: false };
    pub const BLUE: Color = Color { r: false, g: false, b: true };
    pub const WHITE: Color = Color { r: true, g: true, b: true };
}

struct RgbSink([Box<dyn OutputPin>; 3]);

impl LevelSink<Color> for RgbSink {
    fn apply(&mut self, level: Color) -> Result<(), PeripheralError> {
        let [r, g, b] = &mut self.0;
        r.set(level.r)?;
        g.set(level.g)?;
        b.set(level.b)
    }

    fn close(&mut self) {
        for pin in &mut self.0 {
            pin.close();
        }
    }
}

/// Tri-color status indicator.
pub struct StatusLed {
    playback: Playback<Color>,
    blink_period: Duration,
}

impl StatusLed {
    pub fn new(pins: [Box<dyn OutputPin>; 3], blink_period: Duration) -> Self {
        Self { playback: Playback::new(Box::new(RgbSink(pins)), Color::OFF), blink_period }
    }

    pub fn blink_pattern(on: Color, off: Color, period: Duration) -> Pattern<Color> {
        Pattern::looping(vec![(on, period / 2), (off, period / 2)])
    }

    pub fn off(&mut self) -> Result<(), PeripheralError> { self.playback.stop() }

    pub fn solid(&mut self, color: Color) -> Result<(), PeripheralError> { self.playback.set(color) }

    /// Alternates `on` and `off` until the next call.
    pub fn blink(&mut self, on: Color, off: Color) {
        self.playback.play(Self::blink_pattern(on, off, self.blink_period));
    }

    /// One `on`/`off` cycle for each of `colors`.
    pub fn flash(&mut self, colors: &[Color]) {
        let half = self.blink_period / 2;
        self.playback.play(Pattern::once(colors.iter().flat_map(|c| [(*c, half), (Color::OFF, half)]).collect()));
    }

    pub fn is_playing(&self) -> bool { self.playback.is_playing() }

    pub async fn finish(&mut self) { self.playback.finish().await; }

    pub fn close(&mut self) { self.playback.close(); }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatchPosition {
    Open,
    Closed,
}

/// Deployment hatch on a servo with two named positions.
pub struct Hatch {
    servo: Box<dyn ServoOutput>,
    open: f64,
    closed: f64,
    position: Option<HatchPosition>,
}

impl Hatch {
    pub fn new(servo: Box<dyn ServoOutput>, open: f64, closed: f64) -> Self {
        Self { servo, open, closed, position: None }
    }

    pub fn position(&self) -> Option<HatchPosition> { self.position }

    pub fn open(&mut self) -> Result<(), PeripheralError> { self.move_to(HatchPosition::Open) }

    pub fn close(&mut self) -> Result<(), PeripheralError> { self.move_to(HatchPosition::Closed) }

    fn move_to(&mut self, position: HatchPosition) -> Result<(), PeripheralError> {
        let value = match position {
            HatchPosition::Open => self.open,
            HatchPosition::Closed => self.closed,
        };
        self.servo.set_value(value)?;
        if self.position != Some(position) {
            info!("Hatch {}", if position == HatchPosition::Open { "opened" } else { "closed" });
        }
        self.position = Some(position);
        Ok(())
    }

    /// Detaches the servo, leaving the hatch where it is.
    pub fn release(&mut self) { self.servo.close(); }
}
