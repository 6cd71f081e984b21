/// 7-bit I2C slave address of the controller.
pub const I2C_ADDRESS: u8 = 0x66;
/// Largest write transaction we accept, pointer byte included.
pub const RX_BUFFER_SIZE: usize = 16;

/// Seconds to count tacho impulses before re-calculating RPS/RPM.
pub const RPS_MULTI: u32 = 3;
pub const SECONDS_PER_MINUTE: u32 = 60;
pub const MS_PER_SECOND: u32 = 1000;

/// Fan is considered spinning above this speed while calibrating.
pub const CALIBRATION_RPM_THRESHOLD: u32 = 200;
/// PWM increment per measurement while ramping.
pub const CALIBRATION_STEP: u8 = 5;
/// Added to the winning PWM level to be sure the fan keeps rotating.
pub const CALIBRATION_MARGIN: u8 = 5;

/// How long the LED stays lit for a bus write.
pub const BLINK_MS: u16 = 50;

pub const MAX_LEVEL: u8 = u8::MAX;

pub const SYSCLK_HZ: u32 = 48_000_000;
pub const PCLK1_HZ: u32 = SYSCLK_HZ / 2;
/// 4-wire PC fans expect 21-28 kHz
pub const PWM_FREQ_HZ: u32 = 25_000;
