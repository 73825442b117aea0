// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MAC-and-Destroy (spec §4.3 `mac_and_destroy`): consumes a slot's
//! stored secret against a host nonce to produce a tag, destroying the
//! slot's contents in the same operation.

use super::{check_slot, dispatch, CommandId};
use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{ArgumentError, Error, Result};

/// Number of MAC-and-Destroy slots. Spec §4.3 gives `mac_and_destroy` a
/// `slot` and a 32-byte nonce but no explicit range the way R-memory
/// (0..511) and pairing keys (0..3) get one; sized as its own pool,
/// distinct from R-memory, matching how the real chip keeps
/// MAC-and-Destroy slots separate from general R-memory. Recorded as an
/// Open Question resolution in DESIGN.md.
pub const NUM_MACANDD_SLOTS: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAndDestroySlot(u16);

impl MacAndDestroySlot {
    pub fn new(slot: u16) -> Result<Self> {
        check_slot(slot as u32, NUM_MACANDD_SLOTS)?;
        Ok(MacAndDestroySlot(slot))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Consume the slot's stored secret against `nonce`, producing a 32-byte
/// tag and leaving the slot destroyed (spec §4.3).
pub fn mac_and_destroy<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: MacAndDestroySlot,
    nonce: &[u8; 32],
) -> Result<[u8; 32]> {
    let mut req = [0u8; 34];
    req[..2].copy_from_slice(&slot.get().to_le_bytes());
    req[2..].copy_from_slice(nonce);
    let rsp = dispatch(ctx, CommandId::MacAndDestroy, &req)?;
    if rsp.len() != 32 {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut tag = [0u8; 32];
    tag.copy_from_slice(rsp);
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_rejects_out_of_range() {
        assert!(MacAndDestroySlot::new(NUM_MACANDD_SLOTS as u16).is_err());
        assert!(MacAndDestroySlot::new(0).is_ok());
    }
}
