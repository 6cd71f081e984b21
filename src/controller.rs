use embedded_hal::PwmPin;

use crate::{
    calibration::{Calibration, CalibrationState, Step},
    config::Config,
    protocol::{check_burst, I2cPeripheral},
    registers::{
        Register, RegisterFile, STATUS_CALIBRATING, STATUS_CALIBRATION_FAILED,
        STATUS_WRITE_MASK,
    },
    speed::SpeedDriver,
    tacho::Measurement,
    Result,
};

/// Snapshot of the controller for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    pub rps: u32,
    pub rpm: u32,
    pub pwm_level: u8,
    pub floor: u8,
    pub state: CalibrationState,
}

/// State shared between the I2C callbacks and the main loop.
///
/// The bus callbacks write the command registers and drive the PWM output
/// directly. The main loop publishes telemetry and runs the calibration. The
/// register file is the only copy of the speed command and the floor, every
/// write to either recomputes the output from both.
pub struct Controller<P> {
    regs: RegisterFile,
    speed: SpeedDriver<P>,
    calibration: Calibration,
    config: Config,
    blink_requested: bool,
    last: Measurement,
}

impl<P> Controller<P>
where
    P: PwmPin<Duty = u16>,
{
    pub fn new(pwm: P, config: Config) -> Self {
        let mut controller = Self {
            regs: RegisterFile::new(),
            speed: SpeedDriver::new(pwm),
            calibration: Calibration::new(),
            config,
            blink_requested: false,
            last: Measurement::default(),
        };
        controller.apply_speed();
        if config.calibrate_on_start && controller.calibration.request() {
            controller
                .regs
                .set_bits(Register::Status, STATUS_CALIBRATING);
        }
        controller
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn pwm_level(&self) -> u8 {
        self.speed.level()
    }

    pub fn floor(&self) -> u8 {
        self.regs.get(Register::MinPwmFloor)
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.calibration.state()
    }

    /// Command registers are locked while a calibration is in flight.
    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_active()
    }

    /// Returns and clears the pending LED blink request.
    pub fn take_blink_request(&mut self) -> bool {
        core::mem::take(&mut self.blink_requested)
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            rps: self.last.rps,
            rpm: self.last.rpm,
            pwm_level: self.speed.level(),
            floor: self.floor(),
            state: self.calibration.state(),
        }
    }

    /// Applies one write transaction: pointer byte, then data bytes written
    /// with auto increment.
    pub fn write_burst(&mut self, bytes: &[u8]) -> Result<()> {
        let (pointer, data) = check_burst(bytes)?;

        self.blink_requested = true;
        self.regs.set_pointer(pointer);

        for &byte in data {
            self.write_current(byte);
            self.regs.advance();
        }
        Ok(())
    }

    fn write_current(&mut self, byte: u8) {
        let reg = match self.regs.current() {
            Some(reg) if !self.calibration.is_active() => reg,
            Some(reg) => {
                debug!("{} locked during calibration, dropped {}", reg, byte);
                return;
            }
            None => return,
        };

        match reg {
            Register::Status => {
                let status = byte & STATUS_WRITE_MASK;
                self.regs.set(Register::Status, status);
                if status & STATUS_CALIBRATING != 0 {
                    self.calibration.request();
                }
            }
            Register::SpeedCommand | Register::MinPwmFloor => {
                trace!("{} <- {}", reg, byte);
                self.regs.set(reg, byte);
                self.apply_speed();
            }
            // owned by the measurement cycle
            Register::TachoRps | Register::TachoRpmLow | Register::TachoRpmHigh => {}
        }
    }

    /// Returns the register at the pointer and moves the pointer on.
    pub fn read_next(&mut self) -> u8 {
        let value = self.regs.read_current();
        self.regs.advance();
        value
    }

    fn apply_speed(&mut self) {
        let requested = self.regs.get(Register::SpeedCommand);
        self.speed.set_speed(requested, self.floor());
    }

    /// Publishes one measurement window and advances the calibration.
    pub fn on_measurement(&mut self, measurement: Measurement) {
        self.last = measurement;
        let [rps, rpm_low, rpm_high] = measurement.register_bytes();
        self.regs.set(Register::TachoRps, rps);
        self.regs.set(Register::TachoRpmLow, rpm_low);
        self.regs.set(Register::TachoRpmHigh, rpm_high);

        let step = self
            .calibration
            .step(measurement.rpm, self.speed.level(), &self.config);

        match step {
            Step::Idle | Step::Settle => {}
            Step::StopFan => {
                self.speed.stop();
                self.regs.clear_bits(Register::Status, STATUS_CALIBRATION_FAILED);
                self.regs.set_bits(Register::Status, STATUS_CALIBRATING);
            }
            Step::Ramp(level) => {
                self.speed.apply(level);
                self.regs.set_bits(Register::Status, STATUS_CALIBRATING);
            }
            Step::Done { floor } => {
                info!("calibrated min pwm {} at {} rpm", floor, measurement.rpm);
                self.regs.set(Register::MinPwmFloor, floor);
                self.regs.clear_bits(Register::Status, STATUS_CALIBRATING);
                self.speed.stop();
            }
            Step::Failed => {
                warn!("fan did not spin up at full power, floor kept at {}", self.floor());
                self.regs.clear_bits(Register::Status, STATUS_CALIBRATING);
                self.regs.set_bits(Register::Status, STATUS_CALIBRATION_FAILED);
                self.speed.stop();
            }
        }
    }
}

impl<P> I2cPeripheral for Controller<P>
where
    P: PwmPin<Duty = u16>,
{
    fn on_write_burst(&mut self, bytes: &[u8]) {
        if let Err(e) = self.write_burst(bytes) {
            warn!("write ignored: {}", e);
        }
    }

    fn on_read_request(&mut self) -> u8 {
        self.read_next()
    }
}
