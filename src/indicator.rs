use embedded_hal::{blocking::delay::DelayMs, digital::v2::OutputPin};

/// Activity LED.
///
/// Lit steadily while a calibration runs; a bus write flashes it briefly on
/// top of that.
pub struct Indicator<O> {
    pin: O,
    steady: bool,
}

impl<O: OutputPin> Indicator<O> {
    pub fn new(mut pin: O) -> Self {
        pin.set_low().ok();
        Self { pin, steady: false }
    }

    pub fn is_steady_on(&self) -> bool {
        self.steady
    }

    /// Sets the resting level of the LED.
    pub fn set_steady(&mut self, on: bool) {
        if on != self.steady {
            self.steady = on;
            self.drive(on);
        }
    }

    /// Lights the LED for `hold_ms`, then returns to the resting level.
    /// Blocks for the whole hold.
    pub fn blink<D: DelayMs<u16>>(&mut self, delay: &mut D, hold_ms: u16) {
        self.drive(true);
        delay.delay_ms(hold_ms);
        self.drive(false);
        if self.steady {
            self.drive(true);
        }
    }

    fn drive(&mut self, on: bool) {
        if on {
            self.pin.set_high().ok();
        } else {
            self.pin.set_low().ok();
        }
    }

    pub fn release(self) -> O {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct Pin {
        history: Vec<bool>,
    }

    impl OutputPin for Pin {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.history.push(false);
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.history.push(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay {
        total_ms: u32,
    }

    impl DelayMs<u16> for Delay {
        fn delay_ms(&mut self, ms: u16) {
            self.total_ms += ms as u32;
        }
    }

    #[test]
    fn blink_from_off() {
        let mut led = Indicator::new(Pin::default());
        let mut delay = Delay::default();
        led.blink(&mut delay, 50);
        assert_eq!(delay.total_ms, 50);
        assert_eq!(led.release().history, [false, true, false]);
    }

    #[test]
    fn blink_restores_steady_level() {
        let mut led = Indicator::new(Pin::default());
        let mut delay = Delay::default();
        led.set_steady(true);
        led.set_steady(true);
        led.blink(&mut delay, 50);
        assert!(led.is_steady_on());
        assert_eq!(
            led.release().history,
            [false, true, true, false, true]
        );
    }
}
