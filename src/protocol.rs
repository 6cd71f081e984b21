//! Register access protocol spoken by the I2C slave.
//!
//! A write transaction starts with the register pointer, any further bytes
//! are written at the pointer with auto increment. A read returns the register
//! at the pointer, one byte per request, also with auto increment. The pointer
//! wraps to 0 after the last register.

use heapless::Vec;

use crate::{consts::RX_BUFFER_SIZE, Error, Result};

/// Callbacks invoked by the bus transport. Both run in interrupt context and
/// must return without blocking.
pub trait I2cPeripheral {
    /// A complete write transaction was received.
    fn on_write_burst(&mut self, bytes: &[u8]);

    /// The master clocks out one byte.
    fn on_read_request(&mut self) -> u8;
}

/// Checks a write transaction against the receive buffer bounds.
pub fn check_burst(bytes: &[u8]) -> Result<(u8, &[u8])> {
    match bytes {
        [] => Err(Error::EmptyTransaction),
        _ if bytes.len() > RX_BUFFER_SIZE => Err(Error::TransactionTooLong(bytes.len())),
        [pointer, data @ ..] => Ok((*pointer, data)),
    }
}

/// Accumulates the bytes of one write transaction as they arrive.
///
/// Once the buffer overflows the whole transaction is rejected, no partial
/// write is ever handed to the peripheral.
#[derive(Debug, Default)]
pub struct WriteBurst {
    buf: Vec<u8, RX_BUFFER_SIZE>,
    overflow: bool,
}

impl WriteBurst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && !self.overflow
    }

    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.overflow || self.buf.push(byte).is_err() {
            self.overflow = true;
            return Err(Error::RxOverflow);
        }
        Ok(())
    }

    /// Hands a finished transaction to `peripheral` and resets the buffer.
    pub fn dispatch<P: I2cPeripheral>(&mut self, peripheral: &mut P) -> Result<()> {
        let overflow = core::mem::take(&mut self.overflow);
        let result = if overflow {
            Err(Error::RxOverflow)
        } else if self.buf.is_empty() {
            Err(Error::EmptyTransaction)
        } else {
            peripheral.on_write_burst(&self.buf);
            Ok(())
        };
        self.buf.clear();
        result
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflow = false;
    }
}

/// Transfer direction seen from the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Idle,
    Receive,
    Transmit,
}

/// Everything a single event interrupt reported. Several of these can be
/// pending at once when the interrupt was held off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusEvent {
    /// Data byte taken from the receive register.
    pub received: Option<u8>,
    /// Own address matched, at a START or a repeated START.
    pub address: Option<Direction>,
    /// Previous transmit byte went out and the bus waits for the next one.
    pub byte_sent: bool,
    pub stop: bool,
}

/// Slave side of the bus, independent of the peripheral registers.
///
/// Write bytes are collected into a [`WriteBurst`] and handed over at STOP or
/// at a repeated START. Read bytes are requested one at a time.
#[derive(Debug)]
pub struct SlaveSession {
    burst: WriteBurst,
    mode: Mode,
}

impl SlaveSession {
    pub fn new() -> Self {
        Self {
            burst: WriteBurst::new(),
            mode: Mode::Idle,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Applies one batch of bus events and returns the byte to put on the
    /// bus, if any.
    ///
    /// A received byte belongs to the transaction that was running before a
    /// new address match, so it is taken first.
    pub fn handle<P: I2cPeripheral>(&mut self, event: BusEvent, peripheral: &mut P) -> Option<u8> {
        if let Some(byte) = event.received {
            if self.mode == Mode::Receive && self.burst.push(byte).is_err() {
                trace!("rx overflow, dropping {}", byte);
            }
        }

        let mut reply = None;
        match event.address {
            Some(direction) => {
                self.finish_write(peripheral);
                match direction {
                    Direction::Read => {
                        self.mode = Mode::Transmit;
                        reply = Some(peripheral.on_read_request());
                    }
                    Direction::Write => self.mode = Mode::Receive,
                }
            }
            None if event.byte_sent && self.mode == Mode::Transmit => {
                reply = Some(peripheral.on_read_request());
            }
            None => {}
        }

        if event.stop {
            self.finish_write(peripheral);
            self.mode = Mode::Idle;
        }
        reply
    }

    /// The master NACKed the last byte of a read.
    pub fn on_nack(&mut self) {
        if self.mode == Mode::Transmit {
            self.mode = Mode::Idle;
        }
    }

    /// Bus error: a broken write is dropped as a whole.
    pub fn abort(&mut self) {
        self.burst.reset();
        self.mode = Mode::Idle;
    }

    fn finish_write<P: I2cPeripheral>(&mut self, peripheral: &mut P) {
        if self.mode != Mode::Receive || self.burst.is_empty() {
            return;
        }
        if let Err(e) = self.burst.dispatch(peripheral) {
            warn!("write transaction dropped: {}", e);
        }
    }
}

impl Default for SlaveSession {
    fn default() -> Self {
        Self::new()
    }
}
