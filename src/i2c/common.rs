// Licensed under the Apache-2.0 license

//! Common types for the Zynq PS I2C driver: configuration, message and
//! error definitions shared across the driver modules.

use embedded_hal::i2c::{ErrorKind, Operation};
use fugit::MillisDurationU32;

/// Bus data rates the controller supports.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
}

/// Errors reported by the driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The requested serial clock rate cannot be derived from the input
    /// clock (the bus cannot run faster than input clock / 22).
    InvalidClock,
    /// The bus never went idle within the configured deadline.
    BusTimeout,
    /// Bus ownership was lost to another master. Recovered by re-issuing
    /// the message; surfaces only through [`Error::RemoteIo`] once the
    /// retry budget is spent.
    ArbitrationLost,
    /// Arbitration-loss retries exhausted.
    RemoteIo,
    /// The controller latched a fault during the transfer (unacknowledged
    /// address, FIFO overflow or underflow).
    Io,
    /// The register window or interrupt line could not be acquired.
    Resource,
    /// A transaction holds more operations than the adapter can sequence.
    TooManyMessages,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::ArbitrationLost | Error::RemoteIo => ErrorKind::ArbitrationLoss,
            _ => ErrorKind::Other,
        }
    }
}

/// One bus message: a single-direction transfer to one device address.
///
/// A slice of messages submitted together forms a transaction; the
/// controller keeps bus ownership between them and separates them with
/// repeated starts.
pub struct Message<'a> {
    /// Device address. 7-bit unless `ten_bit` is set; masked to ten bits
    /// when programmed.
    pub addr: u16,
    /// Use extended 10-bit addressing for this message.
    pub ten_bit: bool,
    /// Transfer direction and buffer.
    pub op: Operation<'a>,
}

impl<'a> Message<'a> {
    /// Message sending `bytes` to `addr`.
    pub fn write(addr: u16, bytes: &'a [u8]) -> Self {
        Self {
            addr,
            ten_bit: false,
            op: Operation::Write(bytes),
        }
    }

    /// Message filling `buffer` from `addr`.
    pub fn read(addr: u16, buffer: &'a mut [u8]) -> Self {
        Self {
            addr,
            ten_bit: false,
            op: Operation::Read(buffer),
        }
    }

    /// Transfer length in bytes.
    pub fn len(&self) -> usize {
        match &self.op {
            Operation::Read(buffer) => buffer.len(),
            Operation::Write(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-controller configuration.
///
/// `timeout` and `retries` mirror the tunables the transaction scheduler
/// consumes: the value pushed into the controller's time out register
/// whenever it changes, and the number of re-issues allowed after an
/// arbitration loss.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct I2cConfig {
    pub speed: I2cSpeed,
    /// Controller input clock in Hz.
    pub input_clk: u32,
    /// Value programmed into the time out register.
    pub timeout: u8,
    /// Re-issues allowed after an arbitration loss.
    pub retries: u32,
    /// How long a transfer may wait for the bus to go idle.
    pub busy_timeout: MillisDurationU32,
}

/// Builder for [`I2cConfig`]. The input clock is platform data and has no
/// meaningful default; everything else starts from the controller defaults.
pub struct I2cConfigBuilder {
    speed: I2cSpeed,
    input_clk: u32,
    timeout: u8,
    retries: u32,
    busy_timeout: MillisDurationU32,
}

impl I2cConfigBuilder {
    #[must_use]
    pub fn new(input_clk: u32) -> Self {
        Self {
            speed: I2cSpeed::Standard,
            input_clk,
            timeout: 0x1F,
            retries: 3,
            busy_timeout: MillisDurationU32::millis(50_000),
        }
    }

    #[must_use]
    pub fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: u8) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: MillisDurationU32) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn build(self) -> I2cConfig {
        I2cConfig {
            speed: self.speed,
            input_clk: self.input_clk,
            timeout: self.timeout,
            retries: self.retries,
            busy_timeout: self.busy_timeout,
        }
    }
}
