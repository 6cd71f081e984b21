//! The cooperative main loop: LED service and the periodic measurement.

use embedded_hal::{blocking::delay::DelayMs, digital::v2::OutputPin, PwmPin};

use crate::{
    config::Config,
    controller::Controller,
    indicator::Indicator,
    tacho::{Measurement, TachoCounter},
    time::Deadline,
};

pub struct ControlLoop<O, D> {
    deadline: Deadline,
    window_secs: u32,
    blink_ms: u16,
    indicator: Indicator<O>,
    delay: D,
}

impl<O, D> ControlLoop<O, D>
where
    O: OutputPin,
    D: DelayMs<u16>,
{
    /// First measurement is due one period after `now`.
    pub fn new(now: u32, config: &Config, indicator: Indicator<O>, delay: D) -> Self {
        Self {
            deadline: Deadline::new(now, config.period_ms()),
            window_secs: config.rps_multi,
            blink_ms: config.blink_ms,
            indicator,
            delay,
        }
    }

    pub fn indicator(&self) -> &Indicator<O> {
        &self.indicator
    }

    /// Flashes the LED for a pending bus write, then settles it on the
    /// calibration state. Blocks for the blink hold, so never call this with
    /// the controller locked.
    pub fn service_indicator(&mut self, blink: bool, calibrating: bool) {
        self.indicator.set_steady(calibrating);
        if blink {
            self.indicator.blink(&mut self.delay, self.blink_ms);
        }
    }

    /// Runs the measurement when its window is over. Does nothing otherwise.
    pub fn poll<P>(
        &mut self,
        now: u32,
        tacho: &TachoCounter,
        controller: &mut Controller<P>,
    ) -> Option<Measurement>
    where
        P: PwmPin<Duty = u16>,
    {
        if !self.deadline.poll(now) {
            return None;
        }

        let measurement = Measurement::from_pulses(tacho.drain(), self.window_secs);
        controller.on_measurement(measurement);
        debug!("{}", controller.telemetry());
        Some(measurement)
    }

    /// One main loop pass for callers that own the controller outright.
    pub fn run_once<P>(
        &mut self,
        now: u32,
        tacho: &TachoCounter,
        controller: &mut Controller<P>,
    ) -> Option<Measurement>
    where
        P: PwmPin<Duty = u16>,
    {
        let blink = controller.take_blink_request();
        self.service_indicator(blink, controller.is_calibrating());
        let measurement = self.poll(now, tacho, controller);
        if measurement.is_some() {
            self.indicator.set_steady(controller.is_calibrating());
        }
        measurement
    }
}
