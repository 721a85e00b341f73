// Licensed under the Apache-2.0 license

//! Simulated controller and attached device for the unit tests.
//!
//! The model covers what the driver observes through the register window:
//! a 16-byte FIFO, chunked receive delivery with the data/completion
//! interrupt split (a full FIFO plus one outstanding byte raises the data
//! interrupt, a tail that fits raises completion), one completion per
//! drained FIFO on the send side, and injectable NACK/arbitration-loss/bus
//! -busy faults. Instrumentation counters let the tests assert interrupt
//! cadence and hold-bus choreography.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use heapless::Deque;

use crate::common::{LogLevel, Logger};

use super::regs::{cr, ixr, sr, Reg, RegisterBus, FIFO_DEPTH};
use super::traits::{IrqEvent, IrqWait};

pub(crate) struct MockController {
    pub ctrl: u32,
    pub isr: u32,
    pub enabled: u32,
    pub xfer_size: u32,
    pub timeout: u32,
    fifo: Deque<u8, FIFO_DEPTH>,
    /// A transfer was armed by an address-register write.
    started: bool,
    receiving: bool,
    /// A send transfer completes even with nothing staged (address-only).
    addr_comp_pending: bool,

    /// Bytes the device returns on reads, consumed in order.
    rx_pattern: Vec<u8>,
    rx_cursor: usize,
    /// Bytes the device received.
    pub tx_bytes: Vec<u8>,

    /// Fault injection.
    pub busy: bool,
    pub nack: bool,
    /// NACK every message once this many messages have started (0 = off).
    pub nack_after_messages: u32,
    /// Lose arbitration on this many transfer attempts.
    pub arb_losses: u32,
    /// Report every interrupt wait as externally cancelled.
    pub cancel_waits: bool,

    /// Instrumentation.
    pub comp_irqs: u32,
    pub data_irqs: u32,
    messages_started: u32,
    /// (address value, control register) at each address write.
    pub addr_writes: Vec<(u32, u32)>,
    /// Control register at each interrupt-enable write, i.e. at dispatch.
    pub enable_snapshots: Vec<u32>,
    /// Hold-bus bit observed at each receive chunk delivery.
    pub hold_during_chunks: Vec<bool>,
    pub timeout_writes: Vec<u32>,
}

impl MockController {
    pub fn new() -> Self {
        Self {
            ctrl: 0,
            isr: 0,
            enabled: 0,
            xfer_size: 0,
            timeout: 0,
            fifo: Deque::new(),
            started: false,
            receiving: false,
            addr_comp_pending: false,
            rx_pattern: Vec::new(),
            rx_cursor: 0,
            tx_bytes: Vec::new(),
            busy: false,
            nack: false,
            nack_after_messages: 0,
            arb_losses: 0,
            cancel_waits: false,
            comp_irqs: 0,
            data_irqs: 0,
            messages_started: 0,
            addr_writes: Vec::new(),
            enable_snapshots: Vec::new(),
            hold_during_chunks: Vec::new(),
            timeout_writes: Vec::new(),
        }
    }

    pub fn with_rx_pattern(pattern: Vec<u8>) -> Self {
        let mut dev = Self::new();
        dev.rx_pattern = pattern;
        dev
    }

    fn next_rx_byte(&mut self) -> u8 {
        let byte = self.rx_pattern.get(self.rx_cursor).copied().unwrap_or(0);
        self.rx_cursor += 1;
        byte
    }

    fn irq_pending(&self) -> bool {
        self.isr & self.enabled != 0
    }

    /// Let the simulated hardware make one step of progress.
    fn advance(&mut self) {
        if !self.started {
            return;
        }
        if self.arb_losses > 0 {
            self.arb_losses -= 1;
            self.isr |= ixr::ARB_LOST;
            self.started = false;
            return;
        }
        if self.nack
            || (self.nack_after_messages > 0 && self.messages_started > self.nack_after_messages)
        {
            self.isr |= ixr::NACK;
            self.started = false;
            return;
        }
        if self.receiving {
            // Wait until the driver drained the previous chunk.
            if !self.fifo.is_empty() || self.xfer_size == 0 {
                return;
            }
            self.hold_during_chunks.push(self.ctrl & cr::HOLD_BUS != 0);
            if self.xfer_size as usize > FIFO_DEPTH {
                // The FIFO fills while a byte stays outstanding, so the
                // data interrupt is raised instead of completion.
                for _ in 0..FIFO_DEPTH {
                    let byte = self.next_rx_byte();
                    let _ = self.fifo.push_back(byte);
                }
                self.xfer_size -= FIFO_DEPTH as u32;
                self.isr |= ixr::DATA;
                self.data_irqs += 1;
            } else {
                let tail = self.xfer_size as usize;
                for _ in 0..tail {
                    let byte = self.next_rx_byte();
                    let _ = self.fifo.push_back(byte);
                }
                self.xfer_size = 0;
                self.isr |= ixr::COMP;
                self.comp_irqs += 1;
                self.started = false;
            }
        } else {
            if self.fifo.is_empty() && !self.addr_comp_pending {
                return;
            }
            self.addr_comp_pending = false;
            while let Some(byte) = self.fifo.pop_front() {
                self.tx_bytes.push(byte);
            }
            self.xfer_size = 0;
            self.isr |= ixr::COMP;
            self.comp_irqs += 1;
        }
    }

    fn read_reg(&self, reg: Reg) -> u32 {
        match reg {
            Reg::Control => self.ctrl,
            Reg::Status => {
                let mut status = 0;
                if self.busy {
                    status |= sr::BA;
                }
                if !self.fifo.is_empty() {
                    status |= sr::RXDV;
                }
                status
            }
            Reg::InterruptStatus => self.isr,
            Reg::TransferSize => self.xfer_size,
            Reg::Timeout => self.timeout,
            Reg::InterruptMask => ixr::ALL & !self.enabled,
            Reg::Address | Reg::Data | Reg::SlavePause => 0,
            Reg::InterruptEnable | Reg::InterruptDisable => 0,
        }
    }

    fn pop_data(&mut self) -> u32 {
        if self.receiving {
            u32::from(self.fifo.pop_front().unwrap_or(0))
        } else {
            0
        }
    }

    fn write_reg(&mut self, reg: Reg, value: u32) {
        match reg {
            Reg::Control => {
                if value & cr::CLR_FIFO != 0 {
                    self.fifo.clear();
                    self.xfer_size = 0;
                }
                // CLR_FIFO self-clears after the access.
                self.ctrl = value & !cr::CLR_FIFO;
            }
            Reg::Address => {
                self.receiving = self.ctrl & cr::RW != 0;
                self.started = true;
                self.addr_comp_pending = !self.receiving;
                self.messages_started += 1;
                self.addr_writes.push((value, self.ctrl));
            }
            Reg::Data => {
                if self.ctrl & cr::RW == 0 {
                    let _ = self.fifo.push_back(value as u8);
                    self.xfer_size += 1;
                }
            }
            Reg::InterruptStatus => self.isr &= !value,
            Reg::TransferSize => self.xfer_size = value,
            Reg::Timeout => {
                self.timeout = value;
                self.timeout_writes.push(value);
            }
            Reg::InterruptEnable => {
                self.enabled |= value;
                self.enable_snapshots.push(self.ctrl);
            }
            Reg::InterruptDisable => self.enabled &= !value,
            Reg::Status | Reg::InterruptMask | Reg::SlavePause => {}
        }
    }
}

/// Shared handle implementing the driver seams over one mock controller.
#[derive(Clone)]
pub(crate) struct SharedMock(Rc<RefCell<MockController>>);

impl SharedMock {
    pub fn new(dev: MockController) -> Self {
        Self(Rc::new(RefCell::new(dev)))
    }

    pub fn device(&self) -> RefMut<'_, MockController> {
        self.0.borrow_mut()
    }
}

impl RegisterBus for SharedMock {
    fn read(&self, reg: Reg) -> u32 {
        let mut dev = self.0.borrow_mut();
        if reg == Reg::Data {
            dev.pop_data()
        } else {
            dev.read_reg(reg)
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.0.borrow_mut().write_reg(reg, value);
    }
}

impl IrqWait for SharedMock {
    /// Stands in for the interrupt-dispatch collaborator: "sleeping" means
    /// letting the simulated hardware progress, waking when its line is
    /// pending. Reports a cancelled wait when no progress is possible so a
    /// broken test fails instead of hanging.
    fn wait_irq(&mut self) -> IrqEvent {
        let mut dev = self.0.borrow_mut();
        if dev.cancel_waits {
            return IrqEvent::Cancelled;
        }
        dev.advance();
        if dev.irq_pending() {
            IrqEvent::Fired
        } else {
            IrqEvent::Cancelled
        }
    }
}

/// Delay spy: records sleeps instead of performing them.
#[derive(Clone, Default)]
pub(crate) struct MockDelay(Rc<RefCell<u64>>);

impl MockDelay {
    pub fn total_ns(&self) -> u64 {
        *self.0.borrow()
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.0.borrow_mut() += u64::from(ns);
    }
}

/// Logger capturing every message for assertions.
#[derive(Clone, Default)]
pub(crate) struct CapturedLogger(Rc<RefCell<Vec<(LogLevel, String)>>>);

impl CapturedLogger {
    pub fn contains(&self, needle: &str) -> bool {
        self.0.borrow().iter().any(|(_, msg)| msg.contains(needle))
    }
}

impl Logger for CapturedLogger {
    fn log(&self, level: LogLevel, msg: &str) {
        self.0.borrow_mut().push((level, msg.to_owned()));
    }
}
