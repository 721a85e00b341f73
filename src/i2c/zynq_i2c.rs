// Licensed under the Apache-2.0 license

//! Transfer engine and transaction scheduler for the Zynq PS I2C
//! controller.
//!
//! # Receive-mode transfer sizing
//!
//! For a receive longer than the FIFO, the expected byte count is programmed
//! as `FIFO_DEPTH + 1` rather than `FIFO_DEPTH`. With the exact depth the
//! completion interrupt fires while the FIFO is still full and the
//! controller stops clocking before the data interrupt can drain it; the
//! extra outstanding byte keeps a data interrupt pending so the drain/refill
//! cycle continues. The data path conversely ignores tails that fit the
//! FIFO — the completion path drains those.
//!
//! The hold-bus bit realizes repeated starts: it is pre-set for
//! multi-message transactions and released exactly when the final message's
//! remaining bytes fit the FIFO.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress, TenBitAddress};
use heapless::String;

use crate::common::{Logger, NoOpLogger};

use super::clock::{program_divisors, ClockDivisors};
use super::common::{Error, I2cConfig, Message};
use super::completion::Completion;
use super::regs::{
    cr, ixr, sr, Mmio, Reg, RegisterBus, ADDR_MASK, FIFO_DEPTH, I2C0_BASE, I2C0_IRQ, I2C1_BASE,
    I2C1_IRQ,
};
use super::traits::{I2cHardwareCore, I2cMaster, IrqEvent, IrqWait};

/// Control value programmed at attach: master mode, 7-bit addressing,
/// acknowledge generation enabled.
const CR_INIT: u32 = cr::MS | cr::NEA | cr::ACK_EN;

/// Fixed pause between arbitration-loss re-issues.
const RETRY_DELAY_MS: u32 = 2;

/// Bus-busy poll step.
const BUSY_POLL_MS: u32 = 1;

/// Most operations one `transaction_slice` call can sequence.
const MAX_TRANSACTION_OPS: usize = 16;

/// Hardware resources handed to [`ZynqI2c::attach`] by the platform layer.
pub struct BusResources<B, W> {
    /// Register window of the controller instance.
    pub regs: B,
    /// Interrupt-dispatch binding for the controller's interrupt line.
    pub irq: W,
    /// Interrupt line number, kept for diagnostics.
    pub irq_line: u32,
}

/// Driver state for one PS I2C controller instance.
///
/// Exactly one message is in flight per instance at any time. While it is,
/// the interrupt handler is the sole writer of the remaining-byte counts and
/// the latched error status; the scheduler touches them again only after the
/// completion signal fired. That window never overlaps because the handler
/// runs between completion waits (see [`IrqWait`]), not concurrently with
/// them.
pub struct ZynqI2c<B, W, D, L = NoOpLogger>
where
    B: RegisterBus,
    W: IrqWait,
    D: DelayNs,
    L: Logger,
{
    regs: B,
    irq: W,
    delay: D,
    logger: L,
    config: I2cConfig,
    irq_line: u32,
    /// Last value pushed into the time out register.
    cur_timeout: u8,
    /// Error bits latched by the interrupt handler.
    err_status: u32,
    xfer_done: Completion,
    /// Bytes still expected to send for the in-flight message.
    send_count: usize,
    /// Bytes still expected to receive for the in-flight message.
    recv_count: usize,
    /// True while further messages of the current transaction remain, so
    /// the completion paths keep the hold-bus bit set.
    bus_hold_flag: bool,
}

impl<W, D, L> ZynqI2c<Mmio, W, D, L>
where
    W: IrqWait,
    D: DelayNs,
    L: Logger,
{
    /// Attach to the fixed PS I2C 0 instance.
    ///
    /// # Safety
    ///
    /// The I2C 0 register window must be mapped at its physical address and
    /// owned exclusively by this instance; see [`Mmio::map`].
    ///
    /// # Errors
    ///
    /// See [`ZynqI2c::attach`].
    pub unsafe fn attach_i2c0(irq: W, delay: D, config: I2cConfig, logger: L) -> Result<Self, Error> {
        let regs = unsafe { Mmio::map(I2C0_BASE)? };
        Self::attach(
            BusResources {
                regs,
                irq,
                irq_line: I2C0_IRQ,
            },
            delay,
            config,
            logger,
        )
    }

    /// Attach to the fixed PS I2C 1 instance.
    ///
    /// # Safety
    ///
    /// As [`attach_i2c0`](Self::attach_i2c0), for the I2C 1 window.
    ///
    /// # Errors
    ///
    /// See [`ZynqI2c::attach`].
    pub unsafe fn attach_i2c1(irq: W, delay: D, config: I2cConfig, logger: L) -> Result<Self, Error> {
        let regs = unsafe { Mmio::map(I2C1_BASE)? };
        Self::attach(
            BusResources {
                regs,
                irq,
                irq_line: I2C1_IRQ,
            },
            delay,
            config,
            logger,
        )
    }
}

impl<B, W, D, L> ZynqI2c<B, W, D, L>
where
    B: RegisterBus,
    W: IrqWait,
    D: DelayNs,
    L: Logger,
{
    /// Bring a controller instance up: program the mode defaults and the
    /// time out register, then derive and program the clock divisors.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidClock`] when the configured rate is unreachable from
    /// the input clock. The failure path masks every interrupt source
    /// before the partially initialized resources are dropped.
    pub fn attach(
        resources: BusResources<B, W>,
        delay: D,
        config: I2cConfig,
        logger: L,
    ) -> Result<Self, Error> {
        let mut id = Self {
            regs: resources.regs,
            irq: resources.irq,
            irq_line: resources.irq_line,
            delay,
            logger,
            cur_timeout: config.timeout,
            config,
            err_status: 0,
            xfer_done: Completion::new(),
            send_count: 0,
            recv_count: 0,
            bus_hold_flag: false,
        };

        id.regs.write(Reg::Control, CR_INIT);
        id.regs.write(Reg::Timeout, u32::from(id.config.timeout));

        if let Err(error) = id.program_clock(id.config.speed as u32) {
            id.regs.write(Reg::InterruptDisable, ixr::ALL);
            return Err(error);
        }

        let mut banner: String<64> = String::new();
        let _ = write!(
            banner,
            "i2c: {} kHz, irq {}",
            id.config.speed as u32 / 1000,
            id.irq_line
        );
        id.logger.info(banner.as_str());

        Ok(id)
    }

    /// Tear the instance down: mask every interrupt source, then release
    /// the register window and interrupt binding by consuming the driver.
    pub fn detach(mut self) {
        self.regs.write(Reg::InterruptDisable, ixr::ALL);
    }

    /// Error bits the interrupt handler latched for the last message.
    pub fn error_status(&self) -> u32 {
        self.err_status
    }

    /// Update the time out value; pushed to the hardware by the next
    /// transfer.
    pub fn set_timeout(&mut self, timeout: u8) {
        self.config.timeout = timeout;
    }

    /// Execute `msgs` as one bus transaction and return the number of
    /// messages processed.
    ///
    /// The bus is held between messages (repeated starts). An arbitration
    /// loss re-issues the current message up to the configured retry count
    /// with a fixed 2 ms pause; other latched faults abort with
    /// [`Error::Io`].
    ///
    /// A cancelled completion wait (see [`IrqWait`]) abandons the wait
    /// without resetting the controller: the hardware may still be clocking
    /// the current transfer and a later transaction on this instance can
    /// observe it. Callers that cancel are responsible for re-attaching (or
    /// otherwise resetting) before reusing the bus.
    ///
    /// # Errors
    ///
    /// [`Error::BusTimeout`], [`Error::RemoteIo`] or [`Error::Io`]; see
    /// above.
    pub fn transfer(&mut self, msgs: &mut [Message<'_>]) -> Result<usize, Error> {
        self.wait_bus_idle()?;

        // Push the time out value down only when it changed since the last
        // transfer.
        if self.config.timeout != self.cur_timeout {
            self.regs.write(Reg::Timeout, u32::from(self.config.timeout));
            self.cur_timeout = self.config.timeout;
        }

        // More than one message: own the bus for the whole transaction so
        // the controller issues repeated starts instead of stops.
        if msgs.len() > 1 {
            self.bus_hold_flag = true;
            let ctrl = self.regs.read(Reg::Control);
            self.regs.write(Reg::Control, ctrl | cr::HOLD_BUS);
        } else {
            self.bus_hold_flag = false;
        }

        let count = msgs.len();
        let mut result = Ok(count);
        for (index, msg) in msgs.iter_mut().enumerate() {
            if index + 1 == count {
                self.bus_hold_flag = false;
            }
            if let Err(error) = self.process_message(msg) {
                result = Err(error);
                break;
            }
        }

        self.err_status = 0;
        result
    }

    /// Interrupt callback for the controller's interrupt line.
    ///
    /// `msg` must be the message this instance is currently transferring.
    /// The scheduler invokes this between completion waits, so the caller
    /// never reads the transfer state while a pass is running.
    pub fn service_interrupt(&mut self, msg: &mut Message<'_>) {
        let isr_status = self.regs.read(Reg::InterruptStatus);

        // Device did not acknowledge.
        if isr_status & ixr::NACK != 0 {
            self.xfer_done.complete();
        }

        // Bus ownership lost to another master.
        if isr_status & ixr::ARB_LOST != 0 {
            self.xfer_done.complete();
        }

        if isr_status & ixr::DATA != 0 {
            self.on_data_interrupt(msg);
        }

        if isr_status & ixr::COMP != 0 {
            if matches!(msg.op, Operation::Read(_)) {
                self.on_comp_recv(msg);
            } else {
                self.on_comp_send(msg);
            }
        }

        // Latch the fault bits for the scheduler, then acknowledge what was
        // serviced.
        self.err_status = isr_status & ixr::ERR_LATCH;
        self.regs.write(Reg::InterruptStatus, isr_status);
    }

    /// Dispatch one message and block until its completion signal fires,
    /// re-issuing it while arbitration losses stay within budget.
    fn process_message(&mut self, msg: &mut Message<'_>) -> Result<(), Error> {
        let mut retries = self.config.retries;
        loop {
            self.err_status = 0;
            self.xfer_done.reset();

            self.select_address_mode(msg.ten_bit);

            if matches!(msg.op, Operation::Read(_)) {
                self.setup_recv(msg);
            } else {
                self.setup_send(msg);
            }

            self.wait_for_completion(msg);
            self.regs.write(Reg::InterruptDisable, ixr::ALL);

            if self.err_status & ixr::ARB_LOST != 0 {
                if retries > 0 {
                    retries -= 1;
                    self.logger.debug("i2c: lost bus ownership, trying again");
                    self.delay.delay_ms(RETRY_DELAY_MS);
                    continue;
                }
                self.logger.error("i2c: arbitration retries exhausted");
                return Err(Error::RemoteIo);
            }
            if self.err_status & ixr::FAULT != 0 {
                return Err(Error::Io);
            }
            return Ok(());
        }
    }

    /// Prepare and start a master receive for `msg`.
    fn setup_recv(&mut self, msg: &Message<'_>) {
        self.recv_count = msg.len();

        // Receive direction, scrub the FIFO; hold the bus when the message
        // cannot be taken in one FIFO fill.
        let mut ctrl = self.regs.read(Reg::Control);
        ctrl |= cr::RW | cr::CLR_FIFO;
        if self.recv_count > FIFO_DEPTH {
            ctrl |= cr::HOLD_BUS;
        }
        self.regs.write(Reg::Control, ctrl);

        self.ack_pending_interrupts();

        // Writing the address register starts the transfer.
        self.regs
            .write(Reg::Address, u32::from(msg.addr) & ADDR_MASK);

        // Expected byte count, capped at FIFO_DEPTH + 1 (see module docs).
        if self.recv_count > FIFO_DEPTH {
            self.regs.write(Reg::TransferSize, (FIFO_DEPTH + 1) as u32);
        } else {
            self.regs.write(Reg::TransferSize, self.recv_count as u32);
            if !self.bus_hold_flag {
                self.clear_hold_bit();
            }
        }

        self.regs.write(Reg::InterruptEnable, ixr::ENABLED);
    }

    /// Prepare and start a master send for `msg`.
    fn setup_send(&mut self, msg: &Message<'_>) {
        self.send_count = msg.len();

        let mut ctrl = self.regs.read(Reg::Control);
        ctrl &= !cr::RW;
        ctrl |= cr::CLR_FIFO;
        if self.send_count > FIFO_DEPTH {
            ctrl |= cr::HOLD_BUS;
        }
        self.regs.write(Reg::Control, ctrl);

        self.ack_pending_interrupts();

        // The first completion interrupt refills rather than starts from
        // empty, so stage as much of the message as the FIFO takes now.
        self.fill_fifo(msg);

        self.regs
            .write(Reg::Address, u32::from(msg.addr) & ADDR_MASK);

        if !self.bus_hold_flag && self.send_count == 0 {
            self.clear_hold_bit();
        }

        self.regs.write(Reg::InterruptEnable, ixr::ENABLED);
    }

    /// FIFO watermark passed: more data arrived than the completion path
    /// will drain. Only acted on while more than a FIFO's worth is still
    /// expected; shorter tails are left to the completion interrupt (which
    /// the FIFO_DEPTH + 1 programming keeps alive).
    fn on_data_interrupt(&mut self, msg: &mut Message<'_>) {
        let Operation::Read(buffer) = &mut msg.op else {
            return;
        };
        if self.recv_count <= FIFO_DEPTH {
            return;
        }

        let outstanding = self.regs.read(Reg::TransferSize) as usize;
        let bytes_to_recv = (FIFO_DEPTH + 1).saturating_sub(outstanding);
        let cursor = buffer.len() - self.recv_count;
        self.recv_count = self.recv_count.saturating_sub(bytes_to_recv);

        // Reprogram the expected remainder before draining so the
        // controller keeps clocking; once it fits the FIFO, release the bus
        // hold unless the transaction has further messages.
        if self.recv_count > FIFO_DEPTH {
            self.regs.write(Reg::TransferSize, (FIFO_DEPTH + 1) as u32);
        } else {
            self.regs.write(Reg::TransferSize, self.recv_count as u32);
            if !self.bus_hold_flag {
                self.clear_hold_bit();
            }
        }

        for slot in buffer.iter_mut().skip(cursor).take(bytes_to_recv) {
            *slot = self.regs.read(Reg::Data) as u8;
        }
    }

    /// Completion while sending: refill, or signal the caller when the
    /// whole message has been staged.
    fn on_comp_send(&mut self, msg: &Message<'_>) {
        if self.send_count > 0 {
            self.fill_fifo(msg);
        } else {
            self.xfer_done.complete();
        }
        if self.send_count == 0 && !self.bus_hold_flag {
            self.clear_hold_bit();
        }
    }

    /// Completion while receiving: the transfer is done, whatever still
    /// sits in the FIFO is the message tail.
    fn on_comp_recv(&mut self, msg: &mut Message<'_>) {
        if !self.bus_hold_flag {
            self.clear_hold_bit();
        }
        if let Operation::Read(buffer) = &mut msg.op {
            let len = buffer.len();
            while self.recv_count > 0 && self.regs.read(Reg::Status) & sr::RXDV != 0 {
                let byte = self.regs.read(Reg::Data) as u8;
                if let Some(slot) = buffer.get_mut(len - self.recv_count) {
                    *slot = byte;
                }
                self.recv_count -= 1;
            }
        }
        self.xfer_done.complete();
    }

    /// Move up to the available FIFO space from the message into the data
    /// register, advancing the send cursor.
    fn fill_fifo(&mut self, msg: &Message<'_>) {
        let Operation::Write(bytes) = &msg.op else {
            return;
        };
        let staged = self.regs.read(Reg::TransferSize) as usize;
        let avail = FIFO_DEPTH.saturating_sub(staged);
        let chunk = self.send_count.min(avail);
        let sent = bytes.len() - self.send_count;
        for &byte in bytes.iter().skip(sent).take(chunk) {
            self.regs.write(Reg::Data, u32::from(byte));
            self.send_count -= 1;
        }
    }

    /// Block until the interrupt handler signals completion, servicing the
    /// controller after every interrupt wakeup. A cancelled wait returns
    /// with the transfer state as-is (see [`Self::transfer`]).
    fn wait_for_completion(&mut self, msg: &mut Message<'_>) {
        while !self.xfer_done.is_complete() {
            match self.irq.wait_irq() {
                IrqEvent::Fired => self.service_interrupt(msg),
                IrqEvent::Cancelled => break,
            }
        }
    }

    /// Bounded wait for a free bus.
    fn wait_bus_idle(&mut self) -> Result<(), Error> {
        let mut remaining_ms = self.config.busy_timeout.ticks();
        while self.regs.read(Reg::Status) & sr::BA != 0 {
            if remaining_ms == 0 {
                self.logger.warn("i2c: timed out waiting for bus ready");
                return Err(Error::BusTimeout);
            }
            self.delay.delay_ms(BUSY_POLL_MS);
            remaining_ms = remaining_ms.saturating_sub(BUSY_POLL_MS);
        }
        Ok(())
    }

    /// NEA selects 7-bit addressing; cleared for the extended 10-bit mode.
    /// Checked per message.
    fn select_address_mode(&mut self, ten_bit: bool) {
        let ctrl = self.regs.read(Reg::Control);
        if ten_bit {
            self.regs.write(Reg::Control, ctrl & !cr::NEA);
        } else if ctrl & cr::NEA == 0 {
            self.regs.write(Reg::Control, ctrl | cr::NEA);
        }
    }

    /// Drop bus ownership at the end of the current transfer.
    fn clear_hold_bit(&mut self) {
        let ctrl = self.regs.read(Reg::Control);
        if ctrl & cr::HOLD_BUS != 0 {
            self.regs.write(Reg::Control, ctrl & !cr::HOLD_BUS);
        }
    }

    fn ack_pending_interrupts(&mut self) {
        let pending = self.regs.read(Reg::InterruptStatus);
        self.regs.write(Reg::InterruptStatus, pending);
    }

    fn program_clock(&mut self, fscl: u32) -> Result<(), Error> {
        let divisors = ClockDivisors::calculate(self.config.input_clk, fscl)?;
        program_divisors(&mut self.regs, divisors);
        Ok(())
    }
}

impl<B, W, D, L> I2cHardwareCore for ZynqI2c<B, W, D, L>
where
    B: RegisterBus,
    W: IrqWait,
    D: DelayNs,
    L: Logger,
{
    type Error = Error;

    fn set_clock(&mut self, fscl: u32) -> Result<(), Error> {
        self.program_clock(fscl)
    }

    fn enable_interrupts(&mut self, mask: u32) {
        self.regs.write(Reg::InterruptEnable, mask);
    }

    fn disable_interrupts(&mut self, mask: u32) {
        self.regs.write(Reg::InterruptDisable, mask);
    }

    fn clear_interrupts(&mut self, mask: u32) {
        self.regs.write(Reg::InterruptStatus, mask);
    }
}

impl<B, W, D, L> I2cMaster<SevenBitAddress> for ZynqI2c<B, W, D, L>
where
    B: RegisterBus,
    W: IrqWait,
    D: DelayNs,
    L: Logger,
{
    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Error> {
        let mut msgs = [Message::write(addr.into(), bytes)];
        self.transfer(&mut msgs).map(drop)
    }

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<(), Error> {
        let mut msgs = [Message::read(addr.into(), buffer)];
        self.transfer(&mut msgs).map(drop)
    }

    fn write_read(&mut self, addr: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Error> {
        let mut msgs = [
            Message::write(addr.into(), bytes),
            Message::read(addr.into(), buffer),
        ];
        self.transfer(&mut msgs).map(drop)
    }

    fn transaction_slice(
        &mut self,
        addr: u8,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut msgs: heapless::Vec<Message<'_>, MAX_TRANSACTION_OPS> = heapless::Vec::new();
        for op in ops_slice.iter_mut() {
            let op = match op {
                Operation::Read(buffer) => Operation::Read(&mut **buffer),
                Operation::Write(bytes) => Operation::Write(&**bytes),
            };
            msgs.push(Message {
                addr: addr.into(),
                ten_bit: false,
                op,
            })
            .map_err(|_| Error::TooManyMessages)?;
        }
        self.transfer(msgs.as_mut_slice()).map(drop)
    }

    fn transfer_messages(&mut self, msgs: &mut [Message<'_>]) -> Result<usize, Error> {
        self.transfer(msgs)
    }
}

impl<B, W, D, L> I2cMaster<TenBitAddress> for ZynqI2c<B, W, D, L>
where
    B: RegisterBus,
    W: IrqWait,
    D: DelayNs,
    L: Logger,
{
    fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), Error> {
        let mut msgs = [Message {
            addr,
            ten_bit: true,
            op: Operation::Write(bytes),
        }];
        self.transfer(&mut msgs).map(drop)
    }

    fn read(&mut self, addr: u16, buffer: &mut [u8]) -> Result<(), Error> {
        let mut msgs = [Message {
            addr,
            ten_bit: true,
            op: Operation::Read(buffer),
        }];
        self.transfer(&mut msgs).map(drop)
    }

    fn write_read(&mut self, addr: u16, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Error> {
        let mut msgs = [
            Message {
                addr,
                ten_bit: true,
                op: Operation::Write(bytes),
            },
            Message {
                addr,
                ten_bit: true,
                op: Operation::Read(buffer),
            },
        ];
        self.transfer(&mut msgs).map(drop)
    }

    fn transaction_slice(
        &mut self,
        addr: u16,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut msgs: heapless::Vec<Message<'_>, MAX_TRANSACTION_OPS> = heapless::Vec::new();
        for op in ops_slice.iter_mut() {
            let op = match op {
                Operation::Read(buffer) => Operation::Read(&mut **buffer),
                Operation::Write(bytes) => Operation::Write(&**bytes),
            };
            msgs.push(Message {
                addr,
                ten_bit: true,
                op,
            })
            .map_err(|_| Error::TooManyMessages)?;
        }
        self.transfer(msgs.as_mut_slice()).map(drop)
    }

    fn transfer_messages(&mut self, msgs: &mut [Message<'_>]) -> Result<usize, Error> {
        self.transfer(msgs)
    }
}
