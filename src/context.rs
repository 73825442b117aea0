// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`Context`]: the single top-level handle a caller holds per chip (spec
//! §3 data model).
//!
//! `Context` owns the port, the crypto provider, the L2 mode snapshot, the
//! L3 session, and the one shared I/O buffer everything above L1 writes
//! into and reads out of. Per spec §9 Design Notes ("cyclic references"),
//! there is no back-pointer from the session into the context: L1/L2/L3
//! are free functions taking `&mut Context` (or finer borrows of its
//! fields), never the reverse.

use zeroize::Zeroize;

use crate::cap::{Crypto, Logger, NullLogger, Port};
use crate::error::Result;
use crate::l1::PollConfig;
use crate::l2::{self, ChipMode};
use crate::l3::{self, Session, MAX_L3_FRAME};

/// Every duration this crate's protocol names a default for (spec §5,
/// SPEC_FULL §10.3).
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Delay between successive L1 poll reads. Spec default: 1ms.
    pub poll_interval_ms: u32,
    /// Total L1 poll budget per request. Spec default: 70ms.
    pub poll_deadline_ms: u32,
    /// Round-trip budget for the handshake specifically. Spec default:
    /// 150ms.
    pub handshake_deadline_ms: u32,
    /// Budget for a firmware-bank erase, which is far slower than an
    /// ordinary request. Spec default: 30s.
    pub fw_erase_deadline_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            poll_interval_ms: 1,
            poll_deadline_ms: 70,
            handshake_deadline_ms: 150,
            fw_erase_deadline_ms: 30_000,
        }
    }
}

impl Timeouts {
    fn poll_config(&self) -> PollConfig {
        PollConfig {
            poll_interval_ms: self.poll_interval_ms,
            poll_deadline_ms: self.poll_deadline_ms,
        }
    }

    fn handshake_poll_config(&self) -> PollConfig {
        PollConfig {
            poll_interval_ms: self.poll_interval_ms,
            poll_deadline_ms: self.handshake_deadline_ms,
        }
    }

    fn fw_erase_poll_config(&self) -> PollConfig {
        PollConfig {
            poll_interval_ms: self.poll_interval_ms,
            poll_deadline_ms: self.fw_erase_deadline_ms,
        }
    }
}

/// The L2 mode snapshot and last status byte (spec §3 "L2 state").
#[derive(Debug, Clone, Copy, Default)]
pub struct L2State {
    pub mode: Option<ChipMode>,
}

/// Outcome of [`Context::init`]: the chip may come up in application mode
/// directly, or may need (and fail) a startup transition, in which case
/// the caller can still perform a firmware update (spec §4.2 "`init`...
/// returning a dedicated warning if the application firmware fails to
/// boot").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The chip was already in (or successfully transitioned to)
    /// application mode.
    Application,
    /// The chip remained in maintenance mode after `init`; only
    /// firmware-update requests are available until that's resolved.
    Maintenance,
}

/// The top-level per-chip handle (spec §3).
///
/// Generic over a concrete [`Port`]/[`Crypto`] pair rather than `dyn`
/// trait objects, per spec §9's "keep the ABI monomorphizable" note
/// (SPEC_FULL §12). `logger` is the one capability taken as `&dyn Logger`
/// — diagnostic-only and off the command hot path.
pub struct Context<'a, P: Port, C: Crypto> {
    port: P,
    crypto: C,
    logger: &'a dyn Logger,
    timeouts: Timeouts,
    l2: L2State,
    session: Session,
    /// The single I/O buffer backing every L2/L3 request and response
    /// (spec §3: "a single I/O buffer large enough for the longest
    /// encrypted frame plus authentication tag").
    io_buf: [u8; MAX_L3_FRAME],
}

impl<'a, P: Port, C: Crypto> Context<'a, P, C> {
    pub fn new(port: P, crypto: C, timeouts: Timeouts) -> Self {
        Context {
            port,
            crypto,
            logger: &NullLogger,
            timeouts,
            l2: L2State::default(),
            session: Session::Idle,
            io_buf: [0u8; MAX_L3_FRAME],
        }
    }

    /// Attach a logging capability (spec §9: "log level is a
    /// constructor-time setting").
    pub fn with_logger(mut self, logger: &'a dyn Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn mode(&self) -> Option<ChipMode> {
        self.l2.mode
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `(n_cmd, n_res)` of a live session, or `None` if not established
    /// (spec §8 scenario 2's counter-monotonicity check).
    #[cfg(any(test, feature = "test-util"))]
    pub fn session_counters(&self) -> Option<(u64, u64)> {
        self.session.established_counters()
    }

    pub(crate) fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Encrypt, send, and decrypt one L3 command through the live session,
    /// returning a borrow of the response body in the shared I/O buffer
    /// (spec §4.4 "Command Dispatcher": "owns no persistent state beyond
    /// the shared I/O buffer").
    ///
    /// Implemented here (rather than as free functions borrowing separate
    /// accessors) so the borrow checker can see `self.port`, `self.crypto`,
    /// `self.session`, and `self.io_buf` as the disjoint fields they are;
    /// routing the same borrows through `&mut`/`&self` accessor methods
    /// would make them look like one overlapping borrow of `self`.
    pub(crate) fn send_l3_command(&mut self, cmd_id: u8, payload: &[u8]) -> Result<&[u8]> {
        let cfg = self.timeouts.poll_config();
        l3::send_command(
            &mut self.port,
            &self.crypto,
            &mut self.session,
            cmd_id,
            payload,
            &mut self.io_buf,
            cfg,
        )
    }

    /// Read the chip's current mode and, if it is in startup, attempt the
    /// startup-to-application transition (spec §4.2 `init`).
    ///
    /// Returns [`InitOutcome::Maintenance`] rather than an error when the
    /// application firmware fails to boot, so callers can still drive a
    /// firmware update (spec §4.2).
    pub fn init(&mut self) -> Result<InitOutcome> {
        crate::cap::logger::log_debug!(self.logger, "reading chip mode");
        let cfg = self.timeouts.poll_config();
        let mut mode = l2::get_mode(&mut self.port, cfg)?;

        if mode.startup {
            crate::cap::logger::log_debug!(self.logger, "chip in startup, issuing Startup_Req");
            mode = l2::startup(&mut self.port, cfg)?;
        }

        self.l2.mode = Some(mode);
        self.session = Session::Idle;

        if mode.allows_encrypted_cmd() {
            Ok(InitOutcome::Application)
        } else {
            crate::cap::logger::log_warn!(
                self.logger,
                "chip did not reach application mode after startup"
            );
            Ok(InitOutcome::Maintenance)
        }
    }

    /// Tear the context down: abort any live session, zero the shared I/O
    /// buffer, and clear the cached mode (spec §3: "The I/O buffer is
    /// zeroed on deinit"). Idempotent (spec §8 "Idempotent deinit").
    pub fn deinit(&mut self) {
        let cfg = self.timeouts.poll_config();
        let _ = l3::abort_session(&mut self.port, &mut self.session, cfg);
        self.io_buf.zeroize();
        self.l2.mode = None;
    }

    /// Establish an L3 secure session against `pairing_slot` using the
    /// host's long-term keypair and the chip's static public key (spec
    /// §4.3).
    pub fn start_session(
        &mut self,
        pairing_slot: u8,
        pairing_priv: &[u8; 32],
        pairing_pub: &[u8; 32],
        chip_static_pub: &[u8; 32],
    ) -> Result<()> {
        let cfg = self.timeouts.handshake_poll_config();
        l3::start_session(
            &mut self.port,
            &self.crypto,
            &mut self.session,
            pairing_slot,
            pairing_priv,
            pairing_pub,
            chip_static_pub,
            cfg,
        )
    }

    /// Tell the chip to drop session state and force the local session
    /// back to `Idle` (spec §4.3).
    pub fn abort_session(&mut self) -> Result<()> {
        let cfg = self.timeouts.poll_config();
        l3::abort_session(&mut self.port, &mut self.session, cfg)
    }

    pub(crate) fn poll_config(&self) -> PollConfig {
        self.timeouts.poll_config()
    }

    pub(crate) fn fw_erase_poll_config(&self) -> PollConfig {
        self.timeouts.fw_erase_poll_config()
    }
}

impl<'a, P: Port, C: Crypto> Drop for Context<'a, P, C> {
    fn drop(&mut self) {
        self.deinit();
    }
}
