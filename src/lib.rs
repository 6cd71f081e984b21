#![cfg_attr(not(test), no_std)]

// must come first so the log macros are visible to every module below
#[macro_use]
mod fmt;

pub mod calibration;
pub mod config;
pub mod consts;
pub mod control;
pub mod controller;
pub mod indicator;
pub mod protocol;
pub mod registers;
pub mod speed;
pub mod tacho;
pub mod time;

#[cfg(feature = "firmware")]
pub mod i2c_slave;

pub use config::Config;
pub use control::ControlLoop;
pub use controller::{Controller, Telemetry};
pub use protocol::I2cPeripheral;
pub use tacho::TachoCounter;

#[cfg(feature = "firmware")]
mod rt {
    use core::sync::atomic::{AtomicUsize, Ordering};

    // global logger
    use defmt_rtt as _;
    use panic_probe as _;

    // same panicking *behavior* as `panic-probe` but doesn't print a panic message
    // this prevents the panic message being printed *twice* when `defmt::panic` is
    // invoked
    #[defmt::panic_handler]
    fn panic() -> ! {
        cortex_m::asm::udf()
    }

    static COUNT: AtomicUsize = AtomicUsize::new(0);
    defmt::timestamp!("{=usize}", {
        // NOTE(no-CAS) `timestamps` runs with interrupts disabled
        let n = COUNT.load(Ordering::Relaxed);
        COUNT.store(n + 1, Ordering::Relaxed);
        n
    });
}

/// Result type used by the fan controller.
pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Write transaction without even a pointer byte.
    EmptyTransaction,
    /// Write transaction longer than the receive buffer.
    TransactionTooLong(usize),
    /// Receive buffer overflowed while the transaction was still running.
    RxOverflow,
    InvalidConfig,
}
