// Licensed under the Apache-2.0 license

//! High-level I2C controller abstraction.
//!
//! Wraps a hardware implementation of the [`I2cMaster`] traits behind the
//! `embedded-hal` I2C interface so device drivers written against
//! `embedded_hal::i2c::I2c` run unchanged on the PS controllers. Both 7-bit
//! and extended 10-bit addressing are exposed.

use embedded_hal::i2c::{Operation, SevenBitAddress, TenBitAddress};

use crate::common::{Logger, NoOpLogger};

use super::traits::{I2cHardwareCore, I2cMaster};

pub struct I2cController<H, L = NoOpLogger>
where
    H: I2cHardwareCore,
    L: Logger,
{
    pub hardware: H,
    pub logger: L,
}

impl<H> I2cController<H>
where
    H: I2cHardwareCore,
{
    pub fn new(hardware: H) -> Self {
        Self {
            hardware,
            logger: NoOpLogger,
        }
    }
}

impl<H, L> I2cController<H, L>
where
    H: I2cHardwareCore,
    L: Logger,
{
    pub fn with_logger(hardware: H, logger: L) -> Self {
        Self { hardware, logger }
    }
}

impl<H, L> embedded_hal::i2c::ErrorType for I2cController<H, L>
where
    H: I2cHardwareCore,
    L: Logger,
{
    type Error = H::Error;
}

impl<H, L> embedded_hal::i2c::I2c<SevenBitAddress> for I2cController<H, L>
where
    H: I2cMaster<SevenBitAddress>,
    L: Logger,
{
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware.read(addr, buffer)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware.write(addr, bytes)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hardware.write_read(addr, bytes, buffer)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hardware.transaction_slice(addr, operations)
    }
}

impl<H, L> embedded_hal::i2c::I2c<TenBitAddress> for I2cController<H, L>
where
    H: I2cMaster<TenBitAddress>,
    L: Logger,
{
    fn read(&mut self, addr: TenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware.read(addr, buffer)
    }

    fn write(&mut self, addr: TenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware.write(addr, bytes)
    }

    fn write_read(
        &mut self,
        addr: TenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hardware.write_read(addr, bytes, buffer)
    }

    fn transaction(
        &mut self,
        addr: TenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hardware.transaction_slice(addr, operations)
    }
}
