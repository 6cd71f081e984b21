use core::sync::atomic::{AtomicU32, Ordering};

use crate::consts::SECONDS_PER_MINUTE;

/// Pulse accumulator fed from the tacho edge interrupt.
///
/// The counter is word sized so the ISR increment and the main loop drain are
/// single atomic operations; no interrupt masking is needed around them.
pub struct TachoCounter {
    pulses: AtomicU32,
}

impl TachoCounter {
    pub const fn new() -> Self {
        Self {
            pulses: AtomicU32::new(0),
        }
    }

    /// Registers one tacho edge. This is the whole ISR body.
    #[inline(always)]
    pub fn pulse(&self) {
        self.pulses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the pulses counted since the last drain and resets the count.
    #[inline(always)]
    pub fn drain(&self) -> u32 {
        self.pulses.swap(0, Ordering::Relaxed)
    }

    pub fn peek(&self) -> u32 {
        self.pulses.load(Ordering::Relaxed)
    }
}

impl Default for TachoCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Fan speed derived from one measurement window.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub pulses: u32,
    /// Truncated pulses per second, as published in the RPS register.
    pub rps: u32,
    /// Computed straight from the raw pulses, so it can differ from
    /// `rps * 60` by up to one window's quantization.
    pub rpm: u32,
}

impl Measurement {
    pub fn from_pulses(pulses: u32, window_secs: u32) -> Self {
        let window_secs = window_secs.max(1);
        Self {
            pulses,
            rps: pulses / window_secs,
            rpm: pulses.saturating_mul(SECONDS_PER_MINUTE) / window_secs,
        }
    }

    /// Register image: RPS byte, RPM low byte, RPM high byte.
    ///
    /// Values that do not fit are truncated to the field width.
    pub fn register_bytes(&self) -> [u8; 3] {
        [
            (self.rps & 0xff) as u8,
            (self.rpm & 0xff) as u8,
            ((self.rpm >> 8) & 0xff) as u8,
        ]
    }
}
