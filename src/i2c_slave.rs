//! Interrupt driven I2C1 slave transport for the STM32F1.
//!
//! The handlers only move bytes and flags between the peripheral and a
//! [`SlaveSession`]. Read bytes are fetched one at a time: the first one on
//! ADDR, every further one only on BTF, i.e. after the master acknowledged
//! the previous byte. The F1 block would otherwise prefetch one byte more
//! than the master actually clocks out.

use stm32f1xx_hal::pac::{I2C1, RCC};

use crate::protocol::{BusEvent, Direction, I2cPeripheral, Mode, SlaveSession};

const CR1_PE: u32 = 1 << 0;
const CR1_ACK: u32 = 1 << 10;
const CR1_SWRST: u32 = 1 << 15;

const CR2_ITERREN: u32 = 1 << 8;
const CR2_ITEVTEN: u32 = 1 << 9;
const CR2_ITBUFEN: u32 = 1 << 10;

// bit 14 of OAR1 must be kept at 1 by software
const OAR1_RESERVED: u32 = 1 << 14;

const SR1_ADDR: u32 = 1 << 1;
const SR1_BTF: u32 = 1 << 2;
const SR1_STOPF: u32 = 1 << 4;
const SR1_RXNE: u32 = 1 << 6;
const SR1_BERR: u32 = 1 << 8;
const SR1_ARLO: u32 = 1 << 9;
const SR1_AF: u32 = 1 << 10;
const SR1_OVR: u32 = 1 << 11;
const SR1_ERRORS: u32 = SR1_BERR | SR1_ARLO | SR1_AF | SR1_OVR;

const SR2_TRA: u32 = 1 << 2;

const RCC_APB1ENR_I2C1EN: u32 = 1 << 21;

pub struct I2cSlave {
    i2c: I2C1,
    session: SlaveSession,
}

impl I2cSlave {
    /// Resets I2C1 and starts listening on the 7-bit `address`. SCL/SDA must
    /// already be configured as alternate function open drain.
    pub fn new(i2c: I2C1, address: u8, pclk1_mhz: u8) -> Self {
        // SAFETY: single bit set on a clock enable register nothing else
        // touches after clock setup
        unsafe {
            (*RCC::ptr())
                .apb1enr
                .modify(|r, w| w.bits(r.bits() | RCC_APB1ENR_I2C1EN));
        }

        unsafe {
            i2c.cr1.write(|w| w.bits(CR1_SWRST));
            i2c.cr1.write(|w| w.bits(0));
            i2c.cr2
                .write(|w| w.bits(pclk1_mhz as u32 | CR2_ITEVTEN | CR2_ITERREN));
            i2c.oar1
                .write(|w| w.bits(((address as u32) << 1) | OAR1_RESERVED));
            i2c.cr1.write(|w| w.bits(CR1_PE));
            // ACK only sticks once PE is set
            i2c.cr1.modify(|r, w| w.bits(r.bits() | CR1_ACK));
        }

        defmt::info!("i2c slave listening on {=u8:#x}", address);
        Self {
            i2c,
            session: SlaveSession::new(),
        }
    }

    /// I2C1_EV handler body.
    pub fn on_event<P: I2cPeripheral>(&mut self, peripheral: &mut P) {
        let sr1 = self.i2c.sr1.read().bits();
        let mut event = BusEvent::default();

        // a data byte still pending belongs to the transaction before a
        // repeated START
        if sr1 & SR1_RXNE != 0 {
            event.received = Some(self.i2c.dr.read().bits() as u8);
        }

        if sr1 & SR1_ADDR != 0 {
            // reading SR2 after SR1 clears ADDR
            let sr2 = self.i2c.sr2.read().bits();
            event.address = Some(if sr2 & SR2_TRA != 0 {
                Direction::Read
            } else {
                Direction::Write
            });
        }

        event.byte_sent = sr1 & SR1_BTF != 0 && sr1 & SR1_RXNE == 0;

        if sr1 & SR1_STOPF != 0 {
            // STOPF clears by reading SR1 then writing CR1
            self.i2c.cr1.modify(|r, w| unsafe { w.bits(r.bits()) });
            event.stop = true;
        }

        if let Some(byte) = self.session.handle(event, peripheral) {
            self.send(byte);
        }
        self.set_buffer_interrupt(self.session.mode() == Mode::Receive);
    }

    /// I2C1_ER handler body.
    pub fn on_error(&mut self) {
        let sr1 = self.i2c.sr1.read().bits();
        let errors = sr1 & SR1_ERRORS;
        if errors == 0 {
            return;
        }

        // error flags are cleared by writing 0
        self.i2c
            .sr1
            .modify(|r, w| unsafe { w.bits(r.bits() & !errors) });

        if errors == SR1_AF && self.session.mode() == Mode::Transmit {
            // master NACKed the last byte of a read
            self.session.on_nack();
            return;
        }

        defmt::warn!("i2c error {=u32:#x} in {}", errors, self.session.mode());
        self.session.abort();
        self.set_buffer_interrupt(false);
    }

    fn send(&mut self, byte: u8) {
        self.i2c.dr.write(|w| unsafe { w.bits(byte as u32) });
    }

    fn set_buffer_interrupt(&mut self, enabled: bool) {
        self.i2c.cr2.modify(|r, w| unsafe {
            if enabled {
                w.bits(r.bits() | CR2_ITBUFEN)
            } else {
                w.bits(r.bits() & !CR2_ITBUFEN)
            }
        });
    }
}
