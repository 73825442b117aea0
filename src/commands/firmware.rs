// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware update, maintenance-mode only (spec §4.5 "Firmware Update
//! (L2-only)").
//!
//! Unlike every other command in this module, firmware update never goes
//! through L3: maintenance mode has no encrypted session
//! ([`ChipMode::allows_fw_update`]), so this talks straight to L2.

use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{Error, ProtocolError, Result};
use crate::l2::{self, ChipMode, MAX_FW_CHUNK};

/// Erase the target firmware bank ahead of writing a new image (spec
/// §4.5: "erase target bank (`Mutable_Fw_Erase_Req`)").
///
/// Must be called before [`write_image`]; spec §4.5 requires retries
/// after any intermediate error to resume from erase rather than from
/// the last-written chunk, so this crate gives no way to skip it.
pub fn erase_bank<P: Port, C: Crypto>(ctx: &mut Context<'_, P, C>, bank: u8) -> Result<()> {
    require_maintenance(ctx)?;
    let cfg = ctx.fw_erase_poll_config();
    l2::fw_erase(ctx.port_mut(), bank, cfg)
}

/// Write `image` in [`MAX_FW_CHUNK`]-byte pieces starting at offset 0
/// (spec §4.5: "write image in ≤ 128-byte chunks with explicit
/// offset").
///
/// On any intermediate error the chip is left in maintenance mode at
/// whatever offset it last accepted; spec §4.5 requires the caller to
/// restart from [`erase_bank`] rather than resume mid-image.
pub fn write_image<P: Port, C: Crypto>(ctx: &mut Context<'_, P, C>, image: &[u8]) -> Result<()> {
    require_maintenance(ctx)?;
    let cfg = ctx.poll_config();
    for (i, chunk) in image.chunks(MAX_FW_CHUNK).enumerate() {
        let offset = (i * MAX_FW_CHUNK) as u32;
        l2::fw_update_chunk(ctx.port_mut(), offset, chunk, cfg)?;
    }
    Ok(())
}

/// Reboot the chip after a completed firmware write and re-read its mode
/// (spec §4.5: "issue reboot").
pub fn reboot<P: Port, C: Crypto>(ctx: &mut Context<'_, P, C>) -> Result<ChipMode> {
    let cfg = ctx.poll_config();
    l2::startup(ctx.port_mut(), cfg)
}

fn require_maintenance<P: Port, C: Crypto>(ctx: &Context<'_, P, C>) -> Result<()> {
    match ctx.mode() {
        Some(mode) if mode.allows_fw_update() => Ok(()),
        _ => Err(Error::Protocol(ProtocolError::BadChipMode)),
    }
}
