use super::{Color, Inputs, Outputs, PeripheralError, wait_for_toggle};
use crate::log;
use std::time::Duration;

/// Time granted for each manual toggle.
const TOGGLE_TIMEOUT: Duration = Duration::from_secs(8);
const PAUSE: Duration = Duration::from_secs(1);

/// Result of the interactive checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestReport {
    pub arm_switch: bool,
    pub breakwire: bool,
    pub sensors: bool,
}

fn verdict(ok: bool, good: &'static str, bad: &'static str) -> &'static str { if ok { good } else { bad } }

/// Actuates every output once and asks for every input to be toggled.
pub async fn run(
    outputs: &mut Outputs,
    inputs: &Inputs,
    sensors_present: bool,
    beep_period: Duration,
) -> Result<SelfTestReport, PeripheralError> {
    log!("Testing status LED (blinking red-green-blue)");
    outputs.led.flash(&[Color::RED, Color::GREEN, Color::BLUE]);
    outputs.led.finish().await;
    tokio::time::sleep(PAUSE).await;

    log!("Testing buzzer (beeping 3 times short, 2 times long and beeping 1234 in binary)");
    outputs.buzzer.beep(beep_period / 2, beep_period / 2, 3);
    outputs.buzzer.finish().await;
    outputs.buzzer.beep(beep_period * 3 / 2, beep_period / 2, 2);
    outputs.buzzer.finish().await;
    tokio::time::sleep(PAUSE).await;
    outputs.buzzer.number(1234);
    outputs.buzzer.finish().await;
    tokio::time::sleep(PAUSE).await;

    log!("Testing hatch (opening and closing)");
    outputs.hatch.open()?;
    tokio::time::sleep(PAUSE).await;
    outputs.hatch.close()?;
    tokio::time::sleep(PAUSE).await;

    println!("Please toggle arm switch");
    let arm_switch = wait_for_toggle(inputs.arm_switch.as_ref(), TOGGLE_TIMEOUT).await?;
    log!("Arm switch {}", verdict(arm_switch, "working", "timed out"));
    println!("Please insert breakwire and take it out again");
    let breakwire = wait_for_toggle(inputs.breakwire.as_ref(), TOGGLE_TIMEOUT).await?;
    log!("Breakwire detection {}", verdict(breakwire, "working", "timed out"));

    log!("AltIMU10v5 sensors {}", verdict(sensors_present, "present", "not present"));
    Ok(SelfTestReport { arm_switch, breakwire, sensors: sensors_present })
}
