//! Analytical area, timing, and energy estimation for memory arrays, plus an
//! exhaustive search over array organizations.
//!
//! The estimator builds a bank model bottom-up (leaf circuits into a
//! subarray, subarrays into a mat, mats into a bank) and evaluates each
//! candidate organization in a fixed four-phase order: initialize, area, RC,
//! latency/power. The search driver sweeps the structural parameter space and
//! keeps the best candidate per optimization objective.

pub use anyhow::{anyhow, Result};

pub mod blocks;
pub mod cell;
pub mod cli;
pub mod config;
pub mod formula;
pub mod report;
pub mod search;
pub mod tech;
pub mod wire;

use crate::cell::MemCell;
use crate::config::SweepConfig;
use crate::tech::Technology;
use crate::wire::Wire;

/// Sentinel stored in every metric of a unit whose configuration is invalid.
/// Large enough that an invalid candidate can never win a comparison.
pub const INVALID: f64 = 1e41;

/// Ramp slope used where a signal edge is treated as ideally sharp.
pub const INFINITE_RAMP: f64 = 1e20;

/// Read-only inputs shared by every model call during one candidate
/// evaluation. Rebound between successive memory-cell technology sweeps.
pub struct EvalCtx<'a> {
    pub cfg: &'a SweepConfig,
    pub tech: &'a Technology,
    pub cell: &'a MemCell,
    pub local_wire: &'a Wire,
    pub global_wire: &'a Wire,
}

#[inline]
pub(crate) fn clog2(x: u64) -> u32 {
    debug_assert!(x > 0);
    (x as f64).log2().ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::clog2;

    #[test]
    fn clog2_rounds_up() {
        assert_eq!(clog2(1), 0);
        assert_eq!(clog2(2), 1);
        assert_eq!(clog2(3), 2);
        assert_eq!(clog2(4), 2);
        assert_eq!(clog2(1024), 10);
        assert_eq!(clog2(1025), 11);
    }
}
