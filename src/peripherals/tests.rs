use super::synthetic::parse_command;
use super::*;
use std::time::Duration;

fn temp_root(name: &str) -> std::path::PathBuf {
    let root = std::env::temp_dir().join(format!("srp-{name}-{}", rand::random::<u64>()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

#[test]
fn console_commands() {
    assert_eq!(parse_command("arm_switch on"), Some(("arm_switch", true)));
    assert_eq!(parse_command("  breakwire   OFF "), Some(("breakwire", false)));
    assert_eq!(parse_command("breakwire 1"), Some(("breakwire", true)));
    assert_eq!(parse_command("breakwire"), None);
    assert_eq!(parse_command("breakwire maybe"), None);
    assert_eq!(parse_command("breakwire on now"), None);
}

#[test]
fn progress_and_setback_follow_the_beep_period() {
    let period = Duration::from_millis(200);
    let ms = Duration::from_millis;
    assert_eq!(
        Buzzer::progress_pattern(period).steps(),
        &[(true, ms(100)), (false, ms(100)), (true, ms(100)), (false, ms(100))]
    );
    assert_eq!(Buzzer::setback_pattern(period).steps(), &[(true, ms(300)), (false, ms(100))]);
    assert!(!Buzzer::progress_pattern(period).repeats());
}

#[test]
fn numbers_are_beeped_in_binary() {
    let ms = Duration::from_millis;
    // 5 = 0b101
    assert_eq!(
        Buzzer::number_pattern(5).steps(),
        &[
            (true, ms(300)),
            (false, ms(300)),
            (true, ms(600)),
            (false, ms(300)),
            (true, ms(300)),
            (false, ms(300)),
            (false, ms(5000)),
        ]
    );
    assert_eq!(Buzzer::number_pattern(0).steps()[0], (true, ms(600)));
    // 1234 = 0b10011010010, eleven bits
    assert_eq!(Buzzer::number_pattern(1234).steps().len(), 23);
}

#[test]
fn looping_needs_a_duration() {
    assert!(StatusLed::blink_pattern(Color::RED, Color::OFF, Duration::from_millis(500)).repeats());
    assert!(!Pattern::looping(vec![(Color::RED, Duration::ZERO)]).repeats());
}

#[tokio::test(start_paused = true)]
async fn one_shot_pattern_returns_to_idle() {
    let pin = SyntheticOutput::new("buzzer");
    let record = pin.record();
    let mut buzzer = Buzzer::new(Box::new(pin), Duration::from_millis(200));
    buzzer.progress();
    assert!(buzzer.is_playing());
    buzzer.finish().await;
    assert!(!buzzer.is_playing());
    assert_eq!(record.history(), vec![true, false, true, false, false]);
}

#[tokio::test(start_paused = true)]
async fn blink_runs_until_replaced() {
    let pins = [SyntheticOutput::new("r"), SyntheticOutput::new("g"), SyntheticOutput::new("b")];
    let (red, blue) = (pins[0].record(), pins[2].record());
    let mut led = StatusLed::new(pins.map(|p| Box::new(p) as Box<dyn OutputPin>), Duration::from_millis(500));
    led.blink(Color::RED, Color::BLUE);
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert!(led.is_playing());
    assert!(red.history().len() >= 8);
    let red_on = red.history().iter().filter(|on| **on).count();
    let blue_on = blue.history().iter().filter(|on| **on).count();
    assert!(red_on >= 4 && blue_on >= 4 && red_on.abs_diff(blue_on) <= 1);

    led.solid(Color::WHITE).unwrap();
    assert!(!led.is_playing());
    let settled = red.history().len();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(red.history().len(), settled);
    assert_eq!(red.last(), Some(true));
    assert_eq!(blue.last(), Some(true));

    led.off().unwrap();
    assert_eq!(red.last(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn toggle_detection_with_timeout() {
    let input = SyntheticInput::new("arm_switch", false);
    let handle = input.handle();
    let toggler = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        handle.set(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.set(false);
    });
    assert!(wait_for_toggle(&input, Duration::from_secs(8)).await.unwrap());
    toggler.await.unwrap();

    // pressed once, never released again
    let handle = input.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.set(true);
    });
    assert!(!wait_for_toggle(&input, Duration::from_secs(8)).await.unwrap());
    assert!(wait_for_press(&input, Some(Duration::ZERO)).await.unwrap());
    assert!(!wait_for_release(&input, Some(Duration::from_millis(50))).await.unwrap());
}

#[test]
fn hatch_moves_between_named_positions() {
    let servo = SyntheticServo::new("hatch");
    let record = servo.record();
    let mut hatch = Hatch::new(Box::new(servo), 1.0, -1.0);
    assert_eq!(hatch.position(), None);
    hatch.close().unwrap();
    hatch.open().unwrap();
    assert_eq!(hatch.position(), Some(HatchPosition::Open));
    assert_eq!(record.history(), vec![-1.0, 1.0]);

    let mut broken = Hatch::new(Box::new(SyntheticServo::new("hatch")), 1.5, -1.0);
    assert!(matches!(broken.open(), Err(PeripheralError::OutOfRange(_))));
    assert_eq!(broken.position(), None);
}

#[test]
fn sysfs_gpio_levels() {
    let root = temp_root("gpio");
    for pin in [17, 27] {
        std::fs::create_dir_all(root.join(format!("gpio{pin}"))).unwrap();
    }
    let input = SysfsInput::open_at(&root, "arm_switch", 17).unwrap();
    assert_eq!(std::fs::read_to_string(root.join("gpio17/direction")).unwrap(), "in");
    std::fs::write(root.join("gpio17/value"), "0\n").unwrap();
    assert!(input.is_active().unwrap());
    std::fs::write(root.join("gpio17/value"), "1\n").unwrap();
    assert!(!input.is_active().unwrap());
    std::fs::write(root.join("gpio17/value"), "x\n").unwrap();
    assert!(matches!(input.is_active(), Err(PeripheralError::Malformed(_))));

    let mut output = SysfsOutput::open_at(&root, "buzzer", 27).unwrap();
    output.set(true).unwrap();
    assert_eq!(std::fs::read_to_string(root.join("gpio27/value")).unwrap(), "1");
    output.close();
    assert_eq!(std::fs::read_to_string(root.join("gpio27/value")).unwrap(), "0");
}

#[test]
fn sysfs_servo_pulse_widths() {
    assert_eq!(SysfsServo::duty_cycle(-1.0).unwrap(), 1_000_000);
    assert_eq!(SysfsServo::duty_cycle(0.0).unwrap(), 1_500_000);
    assert_eq!(SysfsServo::duty_cycle(1.0).unwrap(), 2_000_000);
    assert!(SysfsServo::duty_cycle(1.01).is_err());

    let root = temp_root("pwm");
    std::fs::create_dir_all(root.join("pwm0")).unwrap();
    let mut servo = SysfsServo::open_at(&root, "hatch", 0).unwrap();
    assert_eq!(std::fs::read_to_string(root.join("pwm0/period")).unwrap(), "20000000");
    servo.set_value(-1.0).unwrap();
    assert_eq!(std::fs::read_to_string(root.join("pwm0/duty_cycle")).unwrap(), "1000000");
    servo.close();
    assert_eq!(std::fs::read_to_string(root.join("pwm0/enable")).unwrap(), "0");
}

#[tokio::test(start_paused = true)]
async fn self_test_reports_every_device() {
    let config = crate::config::FlightConfig::default();
    let (mut peripherals, probes) = Peripherals::synthetic(&config);
    let toggler = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(200)).await;
            probes.arm_switch.set(!probes.arm_switch.get());
            probes.breakwire.set(!probes.breakwire.get());
        }
    });
    let report = selftest::run(&mut peripherals.outputs, &peripherals.inputs, false, Duration::from_millis(200))
        .await
        .unwrap();
    toggler.abort();
    assert_eq!(report, selftest::SelfTestReport { arm_switch: true, breakwire: true, sensors: false });
    assert_eq!(peripherals.outputs.hatch.position(), Some(HatchPosition::Closed));
}

#[tokio::test(start_paused = true)]
async fn self_test_times_out_without_toggles() {
    let config = crate::config::FlightConfig::default();
    let (mut peripherals, probes) = Peripherals::synthetic(&config);
    let report = selftest::run(&mut peripherals.outputs, &peripherals.inputs, true, Duration::from_millis(200))
        .await
        .unwrap();
    assert!(!report.arm_switch && !report.breakwire && report.sensors);
    assert_eq!(probes.hatch.history(), vec![1.0, -1.0]);
    // three LED flashes, five plain beeps and the 1234 report
    assert_eq!(probes.led[1].history().iter().filter(|on| **on).count(), 1);
    assert_eq!(probes.buzzer.history().iter().filter(|on| **on).count(), 5 + 11);
}
