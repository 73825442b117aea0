// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small retry policy helper (SPEC_FULL §11).
//!
//! Spec §7 deliberately leaves retry as a caller decision rather than
//! something L1/L2/L3 decide on their own. This just hands the caller a
//! correct, off-by-one-free loop to make that decision with, rather than
//! every call site growing its own — the same spirit as `drv-spi-api`'s
//! `ControllerLock` RAII helper: a thin convenience wrapper around a
//! capability the crate already exposes, not a new one.

use crate::error::{Error, Result};

/// How many times, and how far apart, to retry a transport-level operation
/// that failed with a retryable [`Error`] (see [`Error::is_retryable`]).
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    /// Total attempts, including the first. `1` disables retrying.
    pub max_attempts: u32,
    /// Delay between attempts, passed to the caller's delay closure.
    pub delay_ms: u32,
}

impl Default for Retry {
    /// Matches spec §5's default poll cadence: a handful of quick retries
    /// rather than one long wait.
    fn default() -> Self {
        Retry {
            max_attempts: 3,
            delay_ms: 1,
        }
    }
}

impl Retry {
    pub fn new(max_attempts: u32, delay_ms: u32) -> Self {
        Retry {
            max_attempts: max_attempts.max(1),
            delay_ms,
        }
    }

    /// Run `f` up to `max_attempts` times, calling `delay` between
    /// attempts, stopping at the first success or the first error
    /// [`Error::is_retryable`] reports as not worth retrying.
    pub fn run<T>(&self, mut delay: impl FnMut(u32), mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && e.is_retryable() => {
                    delay(self.delay_ms);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
