// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monotonic counters (spec §4.3 `mcounter_*`).

use super::{check_slot, dispatch, CommandId};
use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{ArgumentError, Error, Result};

/// Number of monotonic counter slots. Spec §4.3 names `mcounter_*` with
/// no explicit slot bound; sized modestly, matching the handful of
/// monotonic counters the real chip documents, and recorded as an Open
/// Question resolution in DESIGN.md.
pub const NUM_MCOUNTER_SLOTS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McounterSlot(u16);

impl McounterSlot {
    pub fn new(slot: u16) -> Result<Self> {
        check_slot(slot as u32, NUM_MCOUNTER_SLOTS)?;
        Ok(McounterSlot(slot))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Initialize `slot` to `value` (spec §4.3 `mcounter_init`).
pub fn mcounter_init<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: McounterSlot,
    value: u32,
) -> Result<()> {
    let mut req = [0u8; 6];
    req[..2].copy_from_slice(&slot.get().to_le_bytes());
    req[2..].copy_from_slice(&value.to_le_bytes());
    dispatch(ctx, CommandId::McounterInit, &req)?;
    Ok(())
}

/// Read the current value of `slot` without decrementing it (spec §4.3
/// `mcounter_get`).
pub fn mcounter_get<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: McounterSlot,
) -> Result<u32> {
    let rsp = dispatch(ctx, CommandId::McounterGet, &slot.get().to_le_bytes())?;
    read_u32(rsp)
}

/// Decrement `slot` by one, returning the counter's value afterward. Once
/// exhausted, the chip reports `MCounterExhausted` (spec §7
/// `ChipResult`) as a typed outcome rather than a transport error.
pub fn mcounter_update<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: McounterSlot,
) -> Result<u32> {
    let rsp = dispatch(ctx, CommandId::McounterUpdate, &slot.get().to_le_bytes())?;
    read_u32(rsp)
}

fn read_u32(rsp: &[u8]) -> Result<u32> {
    if rsp.len() != 4 {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    Ok(u32::from_le_bytes([rsp[0], rsp[1], rsp[2], rsp[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_rejects_out_of_range() {
        assert!(McounterSlot::new(NUM_MCOUNTER_SLOTS as u16).is_err());
        assert!(McounterSlot::new(0).is_ok());
    }
}
