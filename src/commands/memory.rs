// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-chip configuration and R-memory data slots (spec §4.3
//! `r_config_*`, `i_config_*`, `r_mem_data_*`; glossary "R-memory",
//! "I-config / R-config").

use super::{check_len, check_slot, dispatch, CommandId};
use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{ArgumentError, Error, Result};

/// Size of the single R-config / I-config blob this crate exposes.
///
/// Spec §4.3 lists `r_config_{read,write,erase}` / `i_config_{read,write}`
/// with no address or length parameter, unlike `r_mem_data_*`'s explicit
/// `(slot, data ≤ 444)` — read literally here as one fixed-size
/// configuration object per memory, far smaller than an R-memory record.
/// Recorded as an Open Question resolution in DESIGN.md.
pub const CONFIG_SIZE: usize = 32;

pub fn r_config_read<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
) -> Result<[u8; CONFIG_SIZE]> {
    let rsp = dispatch(ctx, CommandId::RConfigRead, &[])?;
    read_fixed(rsp)
}

pub fn r_config_write<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    data: &[u8; CONFIG_SIZE],
) -> Result<()> {
    dispatch(ctx, CommandId::RConfigWrite, data)?;
    Ok(())
}

pub fn r_config_erase<P: Port, C: Crypto>(ctx: &mut Context<'_, P, C>) -> Result<()> {
    dispatch(ctx, CommandId::RConfigErase, &[])?;
    Ok(())
}

pub fn i_config_read<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
) -> Result<[u8; CONFIG_SIZE]> {
    let rsp = dispatch(ctx, CommandId::IConfigRead, &[])?;
    read_fixed(rsp)
}

/// Write the immutable config. Spec §4.3 lists `i_config_write` in the
/// typed surface without carving it out as a manufacturing-only
/// operation; this crate exposes it like any other command and lets the
/// chip's own access control reject it (surfaced as a `ChipResult`)
/// where not permitted.
pub fn i_config_write<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    data: &[u8; CONFIG_SIZE],
) -> Result<()> {
    dispatch(ctx, CommandId::IConfigWrite, data)?;
    Ok(())
}

fn read_fixed(rsp: &[u8]) -> Result<[u8; CONFIG_SIZE]> {
    if rsp.len() != CONFIG_SIZE {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut out = [0u8; CONFIG_SIZE];
    out.copy_from_slice(rsp);
    Ok(out)
}

/// Number of R-memory data slots (spec §4.3: "slot: 0..511").
pub const NUM_R_MEM_SLOTS: u32 = 512;
/// Largest single R-memory record (spec §4.3: "data ≤ 444").
pub const MAX_R_MEM_DATA: usize = 444;

/// An R-memory slot index, range-checked at construction (spec §4.3
/// `r_mem_data_*(slot: 0..511, ...)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RMemSlot(u16);

impl RMemSlot {
    pub fn new(slot: u16) -> Result<Self> {
        check_slot(slot as u32, NUM_R_MEM_SLOTS)?;
        Ok(RMemSlot(slot))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

pub fn r_mem_data_read<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: RMemSlot,
) -> Result<heapless::Vec<u8, MAX_R_MEM_DATA>> {
    let rsp = dispatch(ctx, CommandId::RMemDataRead, &slot.get().to_le_bytes())?;
    if rsp.len() > MAX_R_MEM_DATA {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut out = heapless::Vec::new();
    out.extend_from_slice(rsp).ok();
    Ok(out)
}

pub fn r_mem_data_write<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: RMemSlot,
    data: &[u8],
) -> Result<()> {
    check_len(data.len(), MAX_R_MEM_DATA)?;
    let mut req = [0u8; 2 + MAX_R_MEM_DATA];
    req[..2].copy_from_slice(&slot.get().to_le_bytes());
    req[2..2 + data.len()].copy_from_slice(data);
    dispatch(ctx, CommandId::RMemDataWrite, &req[..2 + data.len()])?;
    Ok(())
}

pub fn r_mem_data_erase<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: RMemSlot,
) -> Result<()> {
    dispatch(ctx, CommandId::RMemDataErase, &slot.get().to_le_bytes())?;
    Ok(())
}
