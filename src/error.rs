// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The crate's closed error taxonomy.
//!
//! One outer [`Error`] aggregates the five kinds named in the protocol
//! design: transport, protocol, session, argument, and chip-result errors.
//! Each inner kind gets a `From` impl via `derive_more` so `?` composes at
//! call sites without hand-written conversions, the same shape
//! `drv-sprot-api`'s `SprotError` uses over its own four inner kinds.

use derive_more::From;

/// Failures reported by the caller-supplied [`crate::cap::Port`]
/// implementation itself, below the framing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The underlying bus transaction failed (NACK, controller fault, ...).
    Bus,
    /// The port does not implement an optional capability (e.g. the
    /// dedicated ready-pin poll) and none was configured.
    Unsupported,
}

/// L1 framing and bus errors (spec §4.1, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, From)]
pub enum TransportError {
    /// The port reported a bus-level failure while clocking a frame.
    SpiBusError(PortError),
    /// No response (including no `NO_RESP` status) arrived before the poll
    /// deadline elapsed.
    NoResponse,
    /// The CRC16 trailing the received frame did not match the computed
    /// value over `opcode..payload`.
    CrcMismatch,
    /// The caller (or the chip) attempted to frame a payload longer than
    /// the 252-byte L1 maximum.
    FrameOverlong,
    /// A platform with a dedicated ready-pin timed out waiting for it to
    /// assert.
    ReadyPinTimeout,
}

/// L2 unencrypted-protocol errors (spec §4.2, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The chip replied `UNKNOWN_REQ` to a request it does not recognize.
    UnknownRequest,
    /// The chip replied `GEN_ERR`: an internal failure unrelated to framing.
    GenericChipError,
    /// The request is not valid in the chip's current mode (e.g. an L3
    /// command was attempted while the chip is in maintenance mode).
    BadChipMode,
    /// A `Get_Info_Req` subfield response did not match the wire version
    /// this crate was built against (spec §9 Open Question: this crate
    /// implements the v3.1 shape only).
    UnsupportedInfoVersion,
    /// The certificate store or an X.509 DER certificate within it could
    /// not be parsed.
    MalformedCertificateStore,
}

/// L3 secure-session errors (spec §4.3, §7).
///
/// Every variant here, when it arises mid-session, forces the session back
/// to `Idle` and zeroes key material — see [`crate::l3::Session::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The handshake's transcript tag did not verify.
    HandshakeFailed,
    /// A command was attempted with no Established session.
    NoSession,
    /// The AES-GCM authentication tag on a received frame did not verify.
    TagMismatch,
    /// `n_cmd` or `n_res` would wrap on the next increment.
    CounterExhausted,
    /// The AEAD decrypt operation itself failed (distinct from a tag
    /// mismatch surfaced separately by a constant-time compare).
    DecryptFailed,
}

/// Caller-supplied argument is outside the documented range for the
/// command; returned before any I/O occurs (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// A slot index is outside the command's valid range.
    SlotOutOfRange,
    /// A buffer is longer (or, where a command requires an exact length,
    /// the wrong length) than the command allows.
    LengthOutOfRange,
    /// An ECC curve was requested that the targeted command does not
    /// support.
    UnsupportedCurve,
}

/// Typed, non-exceptional chip-reported outcomes.
///
/// These are not "errors" in the sense of the other four kinds: a command
/// whose chip result indicates an empty or unknown slot is still a
/// successful round trip, surfaced as a value so callers can write
/// idempotent operations (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipResult {
    /// The targeted slot holds no key/data.
    SlotEmpty,
    /// The chip rejected a write to the targeted slot.
    SlotWriteFailed,
    /// `ecc_ecdsa_sign`/`ecc_eddsa_sign` succeeded but the signature failed
    /// an internal consistency check the chip itself performs.
    InvalidSignature,
    /// The named monotonic counter has reached zero and cannot be
    /// decremented further.
    MCounterExhausted,
    /// The targeted key slot is locked against the requested operation.
    SlotLocked,
}

/// The crate's single error type.
///
/// Every fallible operation in this crate returns `Result<T, Error>`. No
/// function in this crate panics outside of `debug_assert!` on internal
/// invariants and `#[cfg(test)]` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, From)]
pub enum Error {
    Transport(TransportError),
    Protocol(ProtocolError),
    Session(SessionError),
    Argument(ArgumentError),
    Chip(ChipResult),
}

impl From<PortError> for Error {
    fn from(e: PortError) -> Self {
        Error::Transport(TransportError::SpiBusError(e))
    }
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Whether a fresh attempt of the same operation might succeed where
    /// this one didn't (spec §7: "retry is a caller decision").
    ///
    /// Only the transport failures a single noisy transaction can plausibly
    /// self-correct are retryable. A malformed request, an established
    /// session torn down by a tag mismatch, or an out-of-range argument
    /// will fail identically on a second attempt, so those are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport(
                TransportError::NoResponse
                    | TransportError::CrcMismatch
                    | TransportError::ReadyPinTimeout
            )
        )
    }
}
