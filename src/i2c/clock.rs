// Licensed under the Apache-2.0 license

//! Serial clock divisor calculation.
//!
//! The controller derives the bus clock through two cascaded dividers:
//! `fscl = input_clk / (22 * (div_a + 1) * (div_b + 1))` with
//! `div_a` in `0..=3` and `div_b` in `0..=63`. The bus can therefore not run
//! faster than the input clock divided by 22.

use super::common::Error;
use super::regs::{cr, Reg, RegisterBus};

/// A divider pair for the control register divisor fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockDivisors {
    pub div_a: u32,
    pub div_b: u32,
}

impl ClockDivisors {
    /// Pick the pair whose resulting rate is closest to `fscl` without
    /// exceeding it. Ties keep the first candidate found.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidClock`] when `fscl` is zero or out of range for the
    /// input clock.
    pub fn calculate(input_clk: u32, fscl: u32) -> Result<Self, Error> {
        let divided = 22u32.checked_mul(fscl).ok_or(Error::InvalidClock)?;
        if divided == 0 {
            return Err(Error::InvalidClock);
        }
        // (div_a + 1) * (div_b + 1) has to reach at least this product.
        let temp = input_clk / divided;
        if temp == 0 {
            return Err(Error::InvalidClock);
        }

        let mut best = ClockDivisors { div_a: 0, div_b: 0 };
        let mut last_error = fscl;
        for div_b in 0..64u32 {
            let div_a = temp.div_ceil(div_b + 1).saturating_sub(1);
            if div_a > 3 {
                continue;
            }
            let actual = input_clk / (22 * (div_a + 1) * (div_b + 1));
            let error = actual.abs_diff(fscl);
            if error < last_error && actual <= fscl {
                best = ClockDivisors { div_a, div_b };
                last_error = error;
            }
        }
        Ok(best)
    }

    /// Bus rate this pair produces from `input_clk`.
    pub fn actual(&self, input_clk: u32) -> u32 {
        input_clk / (22 * (self.div_a + 1) * (self.div_b + 1))
    }
}

/// Program the pair into the control register divisor fields, leaving the
/// rest of the register untouched.
pub(crate) fn program_divisors<B: RegisterBus>(regs: &mut B, divisors: ClockDivisors) {
    let mut ctrl = regs.read(Reg::Control);
    ctrl &= !(cr::DIV_A_MASK | cr::DIV_B_MASK);
    ctrl |= (divisors.div_a << cr::DIV_A_SHIFT) | (divisors.div_b << cr::DIV_B_SHIFT);
    regs.write(Reg::Control, ctrl);
}
