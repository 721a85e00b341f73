// Licensed under the Apache-2.0 license

//! Zynq PS I2C driver module.
//!
//! Master-mode driver for the two PS I2C controller instances: an
//! interrupt-driven transfer engine with FIFO refill/drain handling, a
//! transaction scheduler with repeated-start and arbitration-loss retry
//! support, and an `embedded-hal` controller wrapper on top.

pub mod clock;
pub mod common;
pub mod completion;
pub mod i2c_controller;
pub mod regs;
pub mod traits;
pub mod zynq_i2c;

#[cfg(test)]
pub(crate) mod mock;

pub use common::{Error, I2cConfig, I2cConfigBuilder, I2cSpeed, Message};
pub use completion::Completion;
pub use i2c_controller::I2cController;
pub use traits::{I2cHardwareCore, I2cMaster, IrqEvent, IrqWait};
pub use zynq_i2c::{BusResources, ZynqI2c};
