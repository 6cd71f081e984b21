use crate::{consts, Error, Result};

/// Tunables of the measurement and calibration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Length of one measurement window in seconds.
    pub rps_multi: u32,
    pub rpm_threshold: u32,
    pub ramp_step: u8,
    pub floor_margin: u8,
    pub blink_ms: u16,
    /// Request a calibration right after power-up.
    pub calibrate_on_start: bool,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            rps_multi: consts::RPS_MULTI,
            rpm_threshold: consts::CALIBRATION_RPM_THRESHOLD,
            ramp_step: consts::CALIBRATION_STEP,
            floor_margin: consts::CALIBRATION_MARGIN,
            blink_ms: consts::BLINK_MS,
            calibrate_on_start: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        // the window must fit the wrapping clock comparison
        self.rps_multi >= 1
            && self.rps_multi <= i32::MAX as u32 / consts::MS_PER_SECOND
            && self.ramp_step >= 1
    }

    pub fn validate(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(Error::InvalidConfig)
        }
    }

    /// Window length in milliseconds, clamped to what the wrapping clock
    /// comparison can tell apart.
    pub fn period_ms(&self) -> u32 {
        self.rps_multi
            .saturating_mul(consts::MS_PER_SECOND)
            .min(i32::MAX as u32)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
