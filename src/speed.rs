use embedded_hal::PwmPin;

use crate::consts::MAX_LEVEL;

/// Maps a requested speed onto the PWM range above `floor`.
///
/// Zero always stops the fan. Any other request is scaled proportionally from
/// `0..=255` onto `floor..=255`, so a running fan never gets less than the
/// calibrated minimum.
pub fn compute_actual_level(requested: u8, floor: u8) -> u8 {
    if requested == 0 {
        return 0;
    }
    let span = (MAX_LEVEL - floor) as u16;
    let scaled = requested as u16 * span / MAX_LEVEL as u16;
    floor + scaled as u8
}

/// Owns the fan PWM channel and remembers the level last applied to it.
pub struct SpeedDriver<P> {
    pwm: P,
    level: u8,
    max_duty: u16,
}

impl<P> SpeedDriver<P>
where
    P: PwmPin<Duty = u16>,
{
    /// Enables the channel with the fan stopped.
    pub fn new(mut pwm: P) -> Self {
        let max_duty = pwm.get_max_duty();
        pwm.set_duty(0);
        pwm.enable();
        Self {
            pwm,
            level: 0,
            max_duty,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Applies a requested speed against the given floor.
    pub fn set_speed(&mut self, requested: u8, floor: u8) {
        self.apply(compute_actual_level(requested, floor));
    }

    /// Drives the output at a raw level, bypassing the remap.
    pub fn apply(&mut self, level: u8) {
        self.level = level;
        let duty = (level as u32 * self.max_duty as u32 / MAX_LEVEL as u32) as u16;
        trace!("pwm level {} duty {}", level, duty);
        self.pwm.set_duty(duty);
    }

    pub fn stop(&mut self) {
        self.apply(0);
    }

    pub fn release(self) -> P {
        self.pwm
    }
}
