// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side driver for a secure-element chip reachable over a
//! synchronous, full-duplex serial bus.
//!
//! The stack is layered the way the chip's own protocol is layered:
//!
//! - [`l1`] — frame clocking, CRC16, response polling. Owns the bus and
//!   nothing else.
//! - [`l2`] — the unencrypted request/response protocol: chip mode,
//!   chunked response assembly, the certificate store.
//! - [`l3`] — the encrypted secure session: handshake, sequenced AEAD
//!   command framing.
//! - [`commands`] — a typed surface over L2/L3, one function per chip
//!   operation, built on [`Context`].
//!
//! Bus I/O and cryptographic primitives are capabilities the caller
//! supplies (see [`cap`]), not things this crate implements — see
//! `SPEC_FULL.md` §1/§6 for the scope boundary.
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(elided_lifetimes_in_paths)]

pub mod cap;
pub mod commands;
pub mod context;
pub mod crc16;
pub mod der;
pub mod error;
pub mod l1;
pub mod l2;
pub mod l3;
pub mod retry;

#[cfg(feature = "test-util")]
pub mod mock;

pub use context::{Context, Timeouts};
pub use error::{Error, Result};
