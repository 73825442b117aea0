// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability interfaces this crate consumes but never implements itself
//! (spec §6): [`port::Port`] (bus I/O), [`crypto::Crypto`] (cryptographic
//! primitives), and [`logger::Logger`] (diagnostics).

pub mod crypto;
pub mod logger;
pub mod port;

pub use crypto::Crypto;
#[cfg(feature = "std")]
pub use logger::LogCrateLogger;
pub use logger::{Level, Logger, NullLogger};
pub use port::Port;
