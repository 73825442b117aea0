// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pairing key slot management (spec §4.3 `pairing_key_*`, §3 "Pairing
//! key slot", glossary "Pairing key").

use super::{check_slot, dispatch, CommandId};
use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{ArgumentError, Error, Result};
use crate::l3::NUM_PAIRING_SLOTS;

/// A pairing key slot index, range-checked at construction (spec §4.3:
/// "slot: 0..3").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingSlot(u8);

impl PairingSlot {
    pub fn new(slot: u8) -> Result<Self> {
        check_slot(slot as u32, NUM_PAIRING_SLOTS as u32)?;
        Ok(PairingSlot(slot))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Write a host pairing public key into `slot` (spec §4.3
/// `pairing_key_write`).
pub fn pairing_key_write<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: PairingSlot,
    pairing_pub: &[u8; 32],
) -> Result<()> {
    let mut req = [0u8; 33];
    req[0] = slot.get();
    req[1..].copy_from_slice(pairing_pub);
    dispatch(ctx, CommandId::PairingKeyWrite, &req)?;
    Ok(())
}

/// Read the pairing public key stored in `slot` (spec §4.3
/// `pairing_key_read`).
pub fn pairing_key_read<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: PairingSlot,
) -> Result<[u8; 32]> {
    let rsp = dispatch(ctx, CommandId::PairingKeyRead, &[slot.get()])?;
    if rsp.len() != 32 {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut pub_key = [0u8; 32];
    pub_key.copy_from_slice(rsp);
    Ok(pub_key)
}

/// Invalidate `slot`, permanently retiring it from future handshakes
/// (spec §4.3 `pairing_key_invalidate`).
pub fn pairing_key_invalidate<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: PairingSlot,
) -> Result<()> {
    dispatch(ctx, CommandId::PairingKeyInvalidate, &[slot.get()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_rejects_out_of_range() {
        assert!(PairingSlot::new(NUM_PAIRING_SLOTS).is_err());
        assert!(PairingSlot::new(NUM_PAIRING_SLOTS - 1).is_ok());
    }
}
