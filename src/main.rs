//! I2C fan controller for the STM32F103 ("blue pill").
//!
//! PA0  TIM2_CH1 fan PWM, 25 kHz
//! PB1  tacho input, falling edge on EXTI1
//! PA1  activity LED
//! PB6  I2C1 SCL, PB7 I2C1 SDA (slave)

#![no_main]
#![no_std]

use embedded_hal::{blocking::delay::DelayMs, Pwm, PwmPin};
use fanctl_firmware::{consts, TachoCounter};
use stm32f1xx_hal::{
    gpio::{
        gpioa::{PA0, PA1},
        gpiob::PB1,
        Alternate, Input, Output, PullUp, PushPull,
    },
    pac,
    pwm::{self, Channel, PwmHz},
    timer::Tim2NoRemap,
};

type PwmTimer2 = PwmHz<pac::TIM2, Tim2NoRemap, pwm::C1, PA0<Alternate<PushPull>>>;

/// Pulses counted by EXTI1, drained by the measurement in `idle`.
static TACHO: TachoCounter = TachoCounter::new();

/// Channel 1 of TIM2 as a single fan output.
pub struct FanPwm(PwmTimer2);

impl PwmPin for FanPwm {
    type Duty = u16;

    fn disable(&mut self) {
        Pwm::disable(&mut self.0, Channel::C1);
    }

    fn enable(&mut self) {
        Pwm::enable(&mut self.0, Channel::C1);
    }

    fn get_duty(&self) -> u16 {
        Pwm::get_duty(&self.0, Channel::C1)
    }

    fn get_max_duty(&self) -> u16 {
        Pwm::get_max_duty(&self.0)
    }

    fn set_duty(&mut self, duty: u16) {
        Pwm::set_duty(&mut self.0, Channel::C1, duty);
    }
}

/// Busy wait delay. SysTick belongs to the RTIC monotonic.
pub struct CycleDelay;

impl DelayMs<u16> for CycleDelay {
    fn delay_ms(&mut self, ms: u16) {
        cortex_m::asm::delay(consts::SYSCLK_HZ / 1_000 * ms as u32);
    }
}

#[rtic::app(device = stm32f1xx_hal::pac)]
mod app {
    use super::*;

    use fanctl_firmware::{
        i2c_slave::I2cSlave, indicator::Indicator, Config, ControlLoop, Controller,
    };
    use stm32f1xx_hal::{
        gpio::{Edge, ExtiPin},
        prelude::*,
    };
    use systick_monotonic::Systick;

    #[monotonic(binds = SysTick, default = true)]
    type Mono = Systick<1000>;

    #[shared]
    struct Shared {
        fan: Controller<FanPwm>,
        #[lock_free]
        i2c: I2cSlave,
    }

    #[local]
    struct Local {
        tacho_pin: PB1<Input<PullUp>>,
        control: ControlLoop<PA1<Output<PushPull>>, CycleDelay>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        let mut dp = cx.device;

        let mut flash = dp.FLASH.constrain();
        let rcc = dp.RCC.constrain();
        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(consts::SYSCLK_HZ.Hz())
            .pclk1(consts::PCLK1_HZ.Hz())
            .freeze(&mut flash.acr);

        let mono = Systick::new(cx.core.SYST, consts::SYSCLK_HZ);

        let mut afio = dp.AFIO.constrain();
        let mut gpioa = dp.GPIOA.split();
        let mut gpiob = dp.GPIOB.split();

        let pwm_pin = gpioa.pa0.into_alternate_push_pull(&mut gpioa.crl);
        let pwm: PwmTimer2 = dp.TIM2.pwm_hz::<Tim2NoRemap, _, _>(
            pwm_pin,
            &mut afio.mapr,
            consts::PWM_FREQ_HZ.Hz(),
            &clocks,
        );

        let config = match Config::new().validate() {
            Ok(config) => config,
            Err(e) => defmt::panic!("invalid config: {}", e),
        };
        let fan = Controller::new(FanPwm(pwm), config);
        defmt::info!("{}", config);

        let mut tacho_pin = gpiob.pb1.into_pull_up_input(&mut gpiob.crl);
        tacho_pin.make_interrupt_source(&mut afio);
        tacho_pin.trigger_on_edge(&mut dp.EXTI, Edge::Falling);
        tacho_pin.enable_interrupt(&mut dp.EXTI);

        let led = Indicator::new(gpioa.pa1.into_push_pull_output(&mut gpioa.crl));
        let control = ControlLoop::new(0, &config, led, CycleDelay);

        gpiob.pb6.into_alternate_open_drain(&mut gpiob.crl);
        gpiob.pb7.into_alternate_open_drain(&mut gpiob.crl);
        let pclk1_mhz = (consts::PCLK1_HZ / 1_000_000) as u8;
        let i2c = I2cSlave::new(dp.I2C1, consts::I2C_ADDRESS, pclk1_mhz);

        defmt::info!("fan controller up at {=u8:#x}", consts::I2C_ADDRESS);

        (
            Shared { fan, i2c },
            Local { tacho_pin, control },
            init::Monotonics(mono),
        )
    }

    #[idle(shared = [fan], local = [control])]
    fn idle(mut cx: idle::Context) -> ! {
        loop {
            let (blink, calibrating) = cx
                .shared
                .fan
                .lock(|fan| (fan.take_blink_request(), fan.is_calibrating()));
            // the blink hold blocks, keep it outside the lock
            cx.local.control.service_indicator(blink, calibrating);

            let now = monotonics::now().ticks() as u32;
            let control = &mut *cx.local.control;
            cx.shared.fan.lock(|fan| control.poll(now, &TACHO, fan));
        }
    }

    #[task(binds = EXTI1, local = [tacho_pin], priority = 3)]
    fn tacho(cx: tacho::Context) {
        cx.local.tacho_pin.clear_interrupt_pending_bit();
        TACHO.pulse();
    }

    #[task(binds = I2C1_EV, shared = [fan, i2c], priority = 2)]
    fn i2c_event(mut cx: i2c_event::Context) {
        let i2c = cx.shared.i2c;
        cx.shared.fan.lock(|fan| i2c.on_event(fan));
    }

    #[task(binds = I2C1_ER, shared = [i2c], priority = 2)]
    fn i2c_error(cx: i2c_error::Context) {
        cx.shared.i2c.on_error();
    }
}
