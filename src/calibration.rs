//! Minimum PWM calibration.
//!
//! The fan is stopped, given one window to spin down and one to settle, then
//! the PWM level is ramped one step per measurement window until the fan turns
//! faster than the threshold. The winning level plus a margin becomes the new
//! floor.

use crate::{config::Config, consts::MAX_LEVEL};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationState {
    #[default]
    Idle,
    /// Request acknowledged, fan still running.
    StopRequested,
    /// Fan forced off, waiting one window before judging speed.
    Stopping,
    Ramping,
}

/// What the controller has to do after a calibration tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    Idle,
    /// Force the output to 0 and report calibration as running.
    StopFan,
    /// Nothing to do this window.
    Settle,
    /// Drive the output at this level.
    Ramp(u8),
    /// Fan turns; store this floor and stop the fan.
    Done { floor: u8 },
    /// Full power reached without the fan turning.
    Failed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    state: CalibrationState,
}

impl Calibration {
    pub const fn new() -> Self {
        Self {
            state: CalibrationState::Idle,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// True from the request until the sequence terminates.
    pub fn is_active(&self) -> bool {
        self.state != CalibrationState::Idle
    }

    /// Arms a calibration. Returns `false` when one is already in flight.
    pub fn request(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        info!("calibration requested");
        self.state = CalibrationState::StopRequested;
        true
    }

    /// Advances the sequence by one measurement window.
    pub fn step(&mut self, rpm: u32, level: u8, config: &Config) -> Step {
        use CalibrationState::*;

        let (next, step) = match self.state {
            Idle => (Idle, Step::Idle),
            StopRequested => (Stopping, Step::StopFan),
            Stopping => (Ramping, Step::Settle),
            Ramping if rpm > config.rpm_threshold => (
                Idle,
                Step::Done {
                    floor: level.saturating_add(config.floor_margin),
                },
            ),
            Ramping if level == MAX_LEVEL => (Idle, Step::Failed),
            Ramping => (Ramping, Step::Ramp(level.saturating_add(config.ramp_step))),
        };

        if next != self.state {
            info!("calibration {} -> {}", self.state, next);
        }
        self.state = next;
        step
    }
}
