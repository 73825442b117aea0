// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The typed command surface (spec §4.3 "Command set", §4.4 "Command
//! Dispatcher").
//!
//! Every function here does the same three things, in order: validate
//! argument ranges with no I/O (spec §7: "Argument errors are returned
//! before any I/O"), serialize the request into the [`Context`]'s shared
//! I/O buffer and send it through [`crate::l3::send_command`], then
//! deserialize (or range-check the length of) the response. None of these
//! functions hold state beyond the `Context` they're given.

mod ecc;
mod firmware;
mod info;
mod mac;
mod mcounter;
mod memory;
mod misc;
mod pairing;

pub use ecc::{EccCurve, EccPublicKey, KeySlot, NUM_ECC_SLOTS};
pub use firmware::{erase_bank, reboot, write_image};
pub use info::{verify_chain, SignatureVerifier};
pub use mac::{mac_and_destroy, MacAndDestroySlot, NUM_MACANDD_SLOTS};
pub use mcounter::{mcounter_get, mcounter_init, mcounter_update, McounterSlot, NUM_MCOUNTER_SLOTS};
pub use memory::{
    i_config_read, i_config_write, r_config_erase, r_config_read, r_config_write, CONFIG_SIZE,
};
pub use misc::{ping, random_bytes, serial_code_get, MAX_PING_LEN, MAX_RANDOM_LEN};
pub use pairing::{pairing_key_invalidate, PairingSlot};

pub use ecc::{ecc_key_erase, ecc_key_generate, ecc_key_read, ecc_key_store};
pub use ecc::{ecc_ecdsa_sign, ecc_eddsa_sign};
pub use memory::{
    r_mem_data_erase, r_mem_data_read, r_mem_data_write, RMemSlot, MAX_R_MEM_DATA,
    NUM_R_MEM_SLOTS,
};
pub use pairing::{pairing_key_read, pairing_key_write};

use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{ArgumentError, Error, Result};

/// Opaque one-byte discriminant prefixing every L3 command's plaintext,
/// chosen by this crate (spec §1 explicitly scopes the on-chip command
/// set's exhaustive wire values out — only the shape is normative).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum CommandId {
    Ping = 0x01,
    Random = 0x02,
    RConfigRead = 0x03,
    RConfigWrite = 0x04,
    RConfigErase = 0x05,
    IConfigRead = 0x06,
    IConfigWrite = 0x07,
    RMemDataRead = 0x08,
    RMemDataWrite = 0x09,
    RMemDataErase = 0x0A,
    EccKeyGenerate = 0x0B,
    EccKeyStore = 0x0C,
    EccKeyRead = 0x0D,
    EccKeyErase = 0x0E,
    EccEcdsaSign = 0x0F,
    EccEddsaSign = 0x10,
    MacAndDestroy = 0x11,
    PairingKeyWrite = 0x12,
    PairingKeyRead = 0x13,
    PairingKeyInvalidate = 0x14,
    McounterInit = 0x15,
    McounterGet = 0x16,
    McounterUpdate = 0x17,
    SerialCodeGet = 0x18,
}

/// Send one command through the context's live L3 session, returning a
/// borrow of the response body.
pub(crate) fn dispatch<'ctx, P: Port, C: Crypto>(
    ctx: &'ctx mut Context<'_, P, C>,
    cmd_id: CommandId,
    request: &[u8],
) -> Result<&'ctx [u8]> {
    ctx.send_l3_command(cmd_id as u8, request)
}

/// Validate a slot index against an exclusive upper bound, returning
/// [`ArgumentError::SlotOutOfRange`] before any I/O occurs (spec §7).
pub(crate) fn check_slot(slot: u32, bound: u32) -> Result<()> {
    if slot >= bound {
        return Err(Error::Argument(ArgumentError::SlotOutOfRange));
    }
    Ok(())
}

/// Validate a buffer length against an inclusive upper bound.
pub(crate) fn check_len(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    Ok(())
}
