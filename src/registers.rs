/// Register addresses exposed over I2C.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Bit 0: calibration running / requested. Bit 1: last calibration failed.
    Status = 0x00,
    /// Requested speed, 0 (off) to 255 (full speed).
    SpeedCommand = 0x01,
    /// Minimum PWM level at which the fan still rotates.
    MinPwmFloor = 0x02,
    TachoRps = 0x03,
    TachoRpmLow = 0x04,
    TachoRpmHigh = 0x05,
}

pub const REGISTER_COUNT: usize = 6;

pub const STATUS_CALIBRATING: u8 = 1 << 0;
pub const STATUS_CALIBRATION_FAILED: u8 = 1 << 1;
/// Bits of the status register the master may write.
pub const STATUS_WRITE_MASK: u8 = STATUS_CALIBRATING;

impl Register {
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::Status,
        Register::SpeedCommand,
        Register::MinPwmFloor,
        Register::TachoRps,
        Register::TachoRpmLow,
        Register::TachoRpmHigh,
    ];

    pub fn from_pointer(pointer: u8) -> Option<Self> {
        Self::ALL.get(pointer as usize).copied()
    }
}

/// Backing store for the register map plus the bus pointer into it.
///
/// The pointer is loaded from the first byte of every write transaction and
/// is not range checked there. A pointer past the end addresses nothing:
/// writes are dropped, reads return 0, and the next advance wraps it to 0.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterFile {
    regs: [u8; REGISTER_COUNT],
    pointer: u8,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reg: Register) -> u8 {
        self.regs[reg as usize]
    }

    pub fn set(&mut self, reg: Register, value: u8) {
        self.regs[reg as usize] = value;
    }

    pub fn set_bits(&mut self, reg: Register, mask: u8) {
        self.regs[reg as usize] |= mask;
    }

    pub fn clear_bits(&mut self, reg: Register, mask: u8) {
        self.regs[reg as usize] &= !mask;
    }

    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    pub fn set_pointer(&mut self, pointer: u8) {
        self.pointer = pointer;
    }

    /// Register the pointer currently addresses, if any.
    pub fn current(&self) -> Option<Register> {
        Register::from_pointer(self.pointer)
    }

    /// Value at the pointer, 0 when the pointer is out of range.
    pub fn read_current(&self) -> u8 {
        self.current().map_or(0, |reg| self.get(reg))
    }

    /// Moves the pointer to the next register, wrapping to 0 at the end.
    pub fn advance(&mut self) {
        self.pointer = self.pointer.wrapping_add(1);
        if self.pointer as usize >= REGISTER_COUNT {
            self.pointer = 0;
        }
    }

    pub fn as_bytes(&self) -> &[u8; REGISTER_COUNT] {
        &self.regs
    }
}
