// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ECC key slot management and signing (spec §4.3: `ecc_key_*`,
//! `ecc_ecdsa_sign`, `ecc_eddsa_sign`).

use super::{check_len, check_slot, dispatch, CommandId};
use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{ArgumentError, Error, Result};

/// Number of ECC key slots the chip exposes. Not given an explicit bound
/// in spec §4.3 the way R-memory (0..511) and pairing keys (0..3) are;
/// chosen and recorded as an Open Question resolution in DESIGN.md.
pub const NUM_ECC_SLOTS: u32 = 32;

/// The two curves spec §4.3 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EccCurve {
    P256 = 0x01,
    Ed25519 = 0x02,
}

/// An ECC key slot index, range-checked at construction so every command
/// taking one can rely on it already being in range (spec §7: argument
/// checks before I/O).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlot(u16);

impl KeySlot {
    pub fn new(slot: u16) -> Result<Self> {
        check_slot(slot as u32, NUM_ECC_SLOTS)?;
        Ok(KeySlot(slot))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// A P-256 public key is the uncompressed `(x, y)` point; an Ed25519
/// public key is a single 32-byte encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EccPublicKey {
    P256([u8; 64]),
    Ed25519([u8; 32]),
}

pub fn ecc_key_generate<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: KeySlot,
    curve: EccCurve,
) -> Result<()> {
    let mut req = [0u8; 3];
    req[..2].copy_from_slice(&slot.get().to_le_bytes());
    req[2] = curve as u8;
    dispatch(ctx, CommandId::EccKeyGenerate, &req)?;
    Ok(())
}

/// Import an existing private key into `slot` (spec §4.3 `ecc_key_store`).
pub fn ecc_key_store<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: KeySlot,
    curve: EccCurve,
    priv_key: &[u8; 32],
) -> Result<()> {
    let mut req = [0u8; 35];
    req[..2].copy_from_slice(&slot.get().to_le_bytes());
    req[2] = curve as u8;
    req[3..].copy_from_slice(priv_key);
    dispatch(ctx, CommandId::EccKeyStore, &req)?;
    Ok(())
}

pub fn ecc_key_read<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: KeySlot,
) -> Result<EccPublicKey> {
    let rsp = dispatch(ctx, CommandId::EccKeyRead, &slot.get().to_le_bytes())?;
    if rsp.is_empty() {
        return Err(Error::Protocol(crate::error::ProtocolError::GenericChipError));
    }
    match rsp[0] {
        0x01 if rsp.len() == 65 => {
            let mut key = [0u8; 64];
            key.copy_from_slice(&rsp[1..65]);
            Ok(EccPublicKey::P256(key))
        }
        0x02 if rsp.len() == 33 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&rsp[1..33]);
            Ok(EccPublicKey::Ed25519(key))
        }
        _ => Err(Error::Protocol(crate::error::ProtocolError::GenericChipError)),
    }
}

pub fn ecc_key_erase<P: Port, C: Crypto>(ctx: &mut Context<'_, P, C>, slot: KeySlot) -> Result<()> {
    dispatch(ctx, CommandId::EccKeyErase, &slot.get().to_le_bytes())?;
    Ok(())
}

/// Sign a pre-hashed 32-byte digest with the P-256 key in `slot` (spec
/// §4.3 `ecc_ecdsa_sign`).
pub fn ecc_ecdsa_sign<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: KeySlot,
    msg_hash: &[u8; 32],
) -> Result<[u8; 64]> {
    let mut req = [0u8; 34];
    req[..2].copy_from_slice(&slot.get().to_le_bytes());
    req[2..].copy_from_slice(msg_hash);
    let rsp = dispatch(ctx, CommandId::EccEcdsaSign, &req)?;
    read_signature(rsp)
}

/// Sign up to 4096 bytes with the Ed25519 key in `slot` (spec §4.3
/// `ecc_eddsa_sign`).
pub fn ecc_eddsa_sign<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    slot: KeySlot,
    msg: &[u8],
) -> Result<[u8; 64]> {
    check_len(msg.len(), 4096)?;
    let mut req = [0u8; 2 + 4096];
    req[..2].copy_from_slice(&slot.get().to_le_bytes());
    req[2..2 + msg.len()].copy_from_slice(msg);
    let rsp = dispatch(ctx, CommandId::EccEddsaSign, &req[..2 + msg.len()])?;
    read_signature(rsp)
}

fn read_signature(rsp: &[u8]) -> Result<[u8; 64]> {
    if rsp.len() != 64 {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut sig = [0u8; 64];
    sig.copy_from_slice(rsp);
    Ok(sig)
}
