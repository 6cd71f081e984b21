use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;
use embedded_hal::PwmPin;
use fanctl_firmware::calibration::CalibrationState;
use fanctl_firmware::indicator::Indicator;
use fanctl_firmware::protocol::WriteBurst;
use fanctl_firmware::registers::Register;
use fanctl_firmware::{Config, ControlLoop, Controller, I2cPeripheral, TachoCounter};

// --- Mock HAL ---

#[derive(Clone, Default)]
struct MockPwm {
    duty: Rc<RefCell<u16>>,
}

impl PwmPin for MockPwm {
    type Duty = u16;

    fn disable(&mut self) {}
    fn enable(&mut self) {}
    fn get_duty(&self) -> u16 {
        *self.duty.borrow()
    }
    fn get_max_duty(&self) -> u16 {
        255
    }
    fn set_duty(&mut self, duty: u16) {
        *self.duty.borrow_mut() = duty;
    }
}

#[derive(Clone, Default)]
struct MockLed {
    history: Rc<RefCell<Vec<bool>>>,
}

impl OutputPin for MockLed {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.history.borrow_mut().push(false);
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.history.borrow_mut().push(true);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockDelay {
    total_ms: Rc<RefCell<u32>>,
}

impl DelayMs<u16> for MockDelay {
    fn delay_ms(&mut self, ms: u16) {
        *self.total_ms.borrow_mut() += ms as u32;
    }
}

/// Fan that starts turning at level 100 and gains 50 rpm per 5 levels.
fn fan_rpm(level: u16) -> u32 {
    if level < 100 {
        0
    } else {
        (level as u32 - 100) / 5 * 50 + 50
    }
}

struct Bench {
    now: u32,
    pwm: MockPwm,
    led: MockLed,
    delay: MockDelay,
    tacho: TachoCounter,
    /// rpm * passes not yet turned into pulses
    spin: u32,
    fan: Controller<MockPwm>,
    control: ControlLoop<MockLed, MockDelay>,
}

impl Bench {
    fn new(config: Config, start: u32) -> Self {
        let pwm = MockPwm::default();
        let led = MockLed::default();
        let delay = MockDelay::default();
        let fan = Controller::new(pwm.clone(), config);
        let control = ControlLoop::new(start, &config, Indicator::new(led.clone()), delay.clone());
        Self {
            now: start,
            pwm,
            led,
            delay,
            tacho: TachoCounter::new(),
            spin: 0,
            fan,
            control,
        }
    }

    fn level(&self) -> u16 {
        *self.pwm.duty.borrow()
    }

    /// Lets the fan run for `ms` at the current level, one loop pass per
    /// 100 ms, and returns how many measurements ran.
    fn run(&mut self, ms: u32) -> usize {
        let mut measured = 0;
        for _ in 0..ms / 100 {
            // one pulse per revolution, rpm / 600 of them per 100 ms
            self.spin += fan_rpm(self.level());
            while self.spin >= 600 {
                self.tacho.pulse();
                self.spin -= 600;
            }
            self.now = self.now.wrapping_add(100);
            if self
                .control
                .run_once(self.now, &self.tacho, &mut self.fan)
                .is_some()
            {
                measured += 1;
            }
        }
        measured
    }

    fn window(&mut self) {
        assert_eq!(self.run(3_000), 1);
    }

    fn read(&mut self, pointer: u8, n: usize) -> Vec<u8> {
        self.fan.on_write_burst(&[pointer]);
        (0..n).map(|_| self.fan.on_read_request()).collect()
    }
}

fn no_auto_calibration() -> Config {
    Config {
        calibrate_on_start: false,
        ..Config::new()
    }
}

#[test]
fn write_speed_then_read_back() {
    let mut bench = Bench::new(no_auto_calibration(), 0);
    bench.fan.on_write_burst(&[0x01, 0x80]);
    assert_eq!(bench.level(), 128);
    assert_eq!(bench.read(0x01, 1), vec![0x80]);
}

#[test]
fn write_blinks_led_from_main_loop() {
    let mut bench = Bench::new(no_auto_calibration(), 0);
    bench.fan.on_write_burst(&[0x01, 0x10]);
    // nothing happens until the loop runs
    assert_eq!(*bench.led.history.borrow(), vec![false]);
    bench.run(100);
    assert_eq!(*bench.led.history.borrow(), vec![false, true, false]);
    assert_eq!(*bench.delay.total_ms.borrow(), 50);

    bench.run(100);
    assert_eq!(bench.led.history.borrow().len(), 3);
}

#[test]
fn telemetry_published_each_window() {
    let mut bench = Bench::new(no_auto_calibration(), 0);
    bench.fan.on_write_burst(&[0x01, 0xff]);
    assert_eq!(bench.run(2_900), 0);
    assert_eq!(bench.run(100), 1);

    // 255 -> 1600 rpm, 80 pulses per window
    let regs = bench.read(0x03, 3);
    assert_eq!(regs[0], 80 / 3);
    assert_eq!(u16::from_le_bytes([regs[1], regs[2]]), 1600);
    assert_eq!(bench.fan.telemetry().rpm, 1600);
}

#[test]
fn automatic_calibration_converges() {
    let mut bench = Bench::new(Config::new(), 0);
    assert_eq!(bench.fan.calibration_state(), CalibrationState::StopRequested);

    bench.window();
    assert_eq!(bench.fan.calibration_state(), CalibrationState::Stopping);
    assert_eq!(bench.read(0x00, 1), vec![0x01]);
    assert!(bench.control.indicator().is_steady_on());

    bench.window();
    assert_eq!(bench.fan.calibration_state(), CalibrationState::Ramping);

    let mut windows = 0;
    while bench.fan.is_calibrating() {
        bench.window();
        windows += 1;
        assert!(windows < 60, "calibration did not terminate");
    }

    // level 120 is the first to exceed 200 rpm
    assert_eq!(bench.fan.floor(), 125);
    assert_eq!(bench.fan.registers().get(Register::MinPwmFloor), 125);
    assert_eq!(bench.level(), 0);
    assert_eq!(bench.fan.registers().get(Register::Status), 0x00);
    assert!(!bench.control.indicator().is_steady_on());
    // 24 ramp steps to reach 120, one window to see it spin
    assert_eq!(windows, 25);

    bench.fan.on_write_burst(&[0x01, 0x01]);
    assert_eq!(bench.level(), 125);
}

#[test]
fn master_requested_calibration() {
    let mut bench = Bench::new(no_auto_calibration(), 0);
    bench.fan.on_write_burst(&[0x01, 0xc8]);
    bench.window();
    assert_eq!(bench.fan.calibration_state(), CalibrationState::Idle);

    bench.fan.on_write_burst(&[0x00, 0x01]);
    assert_eq!(bench.fan.calibration_state(), CalibrationState::StopRequested);
    assert_eq!(bench.read(0x00, 1), vec![0x01]);
    // fan keeps running until the next window
    assert_eq!(bench.level(), 200);

    bench.window();
    assert_eq!(bench.fan.calibration_state(), CalibrationState::Stopping);
    assert_eq!(bench.level(), 0);

    bench.window();
    assert_eq!(bench.fan.calibration_state(), CalibrationState::Ramping);

    // locked out for the whole sequence
    bench.fan.on_write_burst(&[0x00, 0x00, 0xff, 0x10]);
    assert_eq!(bench.fan.registers().get(Register::SpeedCommand), 0xc8);
    assert_eq!(bench.fan.floor(), 0);

    while bench.fan.is_calibrating() {
        assert_eq!(bench.read(0x00, 1), vec![0x01]);
        bench.window();
    }
    assert_eq!(bench.read(0x00, 1), vec![0x00]);
    assert_eq!(bench.fan.floor(), 125);
}

#[test]
fn dead_fan_fails_calibration() {
    let mut bench = Bench::new(Config::new(), 0);
    // disconnect the tacho: pulses are drained and thrown away
    let mut windows = 0;
    while bench.fan.is_calibrating() {
        bench.now = bench.now.wrapping_add(3_000);
        bench.tacho.drain();
        bench.control.run_once(bench.now, &bench.tacho, &mut bench.fan);
        windows += 1;
        assert!(windows < 100);
    }
    // stop, settle, 51 ramp steps, one failed judgement
    assert_eq!(windows, 54);
    assert_eq!(bench.fan.floor(), 0);
    assert_eq!(bench.level(), 0);
    assert_eq!(bench.fan.registers().get(Register::Status), 0x02);
}

#[test]
fn measurement_cadence_survives_clock_wrap() {
    let start = u32::MAX - 4_000;
    let mut bench = Bench::new(no_auto_calibration(), start);
    let mut total = 0;
    for _ in 0..4 {
        total += bench.run(3_000);
    }
    assert_eq!(total, 4);
    assert!(bench.now < start);
}

#[test]
fn transport_rejects_oversized_burst() {
    let mut bench = Bench::new(no_auto_calibration(), 0);
    let mut burst = WriteBurst::new();
    burst.push(0x01).unwrap();
    for _ in 0..15 {
        burst.push(0x42).unwrap();
    }
    assert!(burst.push(0x42).is_err());
    assert!(burst.dispatch(&mut bench.fan).is_err());
    assert_eq!(bench.fan.registers().get(Register::SpeedCommand), 0);
    assert!(!bench.fan.take_blink_request());

    burst.push(0x01).unwrap();
    burst.push(0x42).unwrap();
    assert!(burst.dispatch(&mut bench.fan).is_ok());
    assert_eq!(bench.fan.registers().get(Register::SpeedCommand), 0x42);
}

#[test]
fn pointer_wraps_over_many_reads() {
    let mut bench = Bench::new(no_auto_calibration(), 0);
    bench.fan.on_write_burst(&[0x00, 0x00, 0x11, 0x22]);
    let bytes = bench.read(0x01, 13);
    assert_eq!(
        bytes,
        vec![0x11, 0x22, 0, 0, 0, 0, 0x11, 0x22, 0, 0, 0, 0, 0x11]
    );
    assert_eq!(bench.fan.registers().pointer(), 2);
}

#[test]
fn oversized_window_clamps_instead_of_overflowing() {
    let config = Config {
        rps_multi: 5_000_000,
        ..no_auto_calibration()
    };
    assert!(config.validate().is_err());
    let mut bench = Bench::new(config, 0);
    assert_eq!(bench.run(3_000), 0);
    bench.fan.on_write_burst(&[0x01, 0x40]);
    assert_eq!(bench.level(), 0x40);
}
