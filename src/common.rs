// Licensed under the Apache-2.0 license

//! Shared DDK infrastructure: the logging seam used by the peripheral
//! drivers.
//!
//! Drivers take a `Logger` type parameter defaulting to [`NoOpLogger`], so
//! diagnostics cost nothing unless the integrator wires a real sink (UART,
//! semihosting, a host test capture).

/// Severity of a [`Logger`] message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for driver diagnostics.
pub trait Logger {
    fn log(&self, level: LogLevel, msg: &str);

    fn debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg);
    }

    fn info(&self, msg: &str) {
        self.log(LogLevel::Info, msg);
    }

    fn warn(&self, msg: &str) {
        self.log(LogLevel::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.log(LogLevel::Error, msg);
    }
}

/// Logger that discards everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _level: LogLevel, _msg: &str) {}
}
