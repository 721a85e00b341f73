// Licensed under the Apache-2.0 license

//! Hardware abstraction traits for the I2C driver.
//!
//! The traits split the driver surface into two tiers: [`I2cHardwareCore`]
//! carries the plumbing every controller needs (clocking, interrupt mask
//! management), [`I2cMaster`] adds the master-mode transfer operations. The
//! [`IrqWait`] seam connects the driver to whatever delivers its interrupt
//! line — a GIC binding on hardware, a simulated controller in the tests.

use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

use super::common::Message;

/// Outcome of one [`IrqWait::wait_irq`] call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqEvent {
    /// The controller's interrupt line is pending.
    Fired,
    /// The wait was cancelled externally; the line may or may not fire
    /// later.
    Cancelled,
}

/// Interrupt-dispatch seam.
///
/// The platform integration implements this to put the calling context to
/// sleep (a bounded sleep, not a spin) until the controller's interrupt
/// line is pending. The driver services the controller itself after every
/// wakeup, so caller and interrupt handler never own the transfer state at
/// the same time.
pub trait IrqWait {
    /// Sleep until the interrupt line fires or the wait is cancelled.
    ///
    /// A cancelled wait is abandoned as-is: the driver does not reset the
    /// controller, which may still be clocking a transfer.
    fn wait_irq(&mut self) -> IrqEvent;
}

/// Core I2C hardware interface: configuration and interrupt plumbing.
pub trait I2cHardwareCore {
    /// Hardware-specific error type implementing the embedded-hal error
    /// traits.
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Program the serial clock rate. The controller must be idle.
    ///
    /// # Errors
    ///
    /// Fails when the rate cannot be derived from the input clock; the
    /// divisor fields are left untouched in that case.
    fn set_clock(&mut self, fscl: u32) -> Result<(), Self::Error>;

    /// Enable the interrupt sources in `mask`.
    fn enable_interrupts(&mut self, mask: u32);

    /// Disable the interrupt sources in `mask`.
    fn disable_interrupts(&mut self, mask: u32);

    /// Acknowledge latched interrupt-status bits.
    fn clear_interrupts(&mut self, mask: u32);
}

/// Master-mode operations.
///
/// The address type `A` follows embedded-hal: [`SevenBitAddress`] (`u8`) by
/// default, `TenBitAddress` (`u16`) for controllers driving extended
/// addressing.
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write `bytes` to the device at `addr`.
    ///
    /// # Errors
    ///
    /// Fails when the device does not acknowledge, arbitration is lost
    /// beyond the retry budget, or the bus never becomes free.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buffer` from the device at `addr`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`write`](Self::write).
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read with a repeated start in between, without releasing
    /// the bus.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`write`](Self::write), during either phase.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8])
        -> Result<(), Self::Error>;

    /// Execute a sequence of operations against one device as a single bus
    /// transaction.
    ///
    /// # Errors
    ///
    /// Fails on the first operation that errors; the remaining operations
    /// are not issued.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;

    /// Execute `msgs` — each with its own address and direction — as one
    /// bus transaction with repeated starts between messages. Returns the
    /// number of messages processed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`write`](Self::write); processing stops at
    /// the first failing message.
    fn transfer_messages(&mut self, msgs: &mut [Message<'_>]) -> Result<usize, Self::Error>;
}
