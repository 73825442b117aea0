// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bus I/O capability (spec §6, component C1).
//!
//! Platform ports (bit-banging GPIO, SPI peripheral setup, RNG source,
//! delay, optional interrupt-pin polling) are out of this crate's scope;
//! this module only defines the interface L1 consumes. A port is owned
//! exclusively by one [`crate::Context`] — see spec §5 — so every method
//! here takes `&mut self`.

use crate::error::PortError;

/// Bus I/O primitives consumed by the L1 transport.
///
/// Implementations are expected to be thin: this is the seam at which a
/// real board wires up its SPI peripheral, GPIO chip-select, RNG source,
/// and a millisecond delay. None of this crate's logic lives here.
pub trait Port {
    /// Clock `len` bytes of `buf` out while clocking the same number of
    /// bytes back in, full-duplex, MSB-first, mode-0. The caller has
    /// already asserted chip-select via [`Port::cs_low`].
    fn spi_transfer(
        &mut self,
        buf: &mut [u8],
        len: usize,
        timeout_ms: u32,
    ) -> Result<(), PortError>;

    /// Assert chip-select (active low).
    fn cs_low(&mut self);

    /// Release chip-select.
    fn cs_high(&mut self);

    /// Fill `buf` with cryptographically strong random bytes.
    fn random(&mut self, buf: &mut [u8]) -> Result<(), PortError>;

    /// Block the calling thread for approximately `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Block until the chip asserts its ready signal, or `timeout_ms`
    /// elapses.
    ///
    /// Platforms without a dedicated ready-pin interrupt return
    /// `Err(PortError::Unsupported)`, which L1 treats identically to the
    /// pin never asserting within the poll loop: it falls back to
    /// status-byte polling.
    fn wait_ready(&mut self, timeout_ms: u32) -> Result<(), PortError> {
        let _ = timeout_ms;
        Err(PortError::Unsupported)
    }
}
