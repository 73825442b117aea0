// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! L3 secure session: handshake, sequenced AEAD command framing (spec
//! §4.3, component C5).
//!
//! This is where the crate's security properties live. Everything above
//! this module (the command dispatcher) only ever sees `send_command`;
//! everything below it (L2/L1) only ever sees opaque request/response
//! bytes. No other module is allowed to read `k_cmd`/`k_res` or advance
//! `n_cmd`/`n_res`.

use zeroize::Zeroize;

use crate::cap::{Crypto, Port};
use crate::error::{ArgumentError, Error, Result, SessionError};
use crate::l1::PollConfig;
use crate::l2;

/// A host-side pairing keypair, one of four slots (spec §4.3, §6).
pub const NUM_PAIRING_SLOTS: u8 = 4;

/// The ASCII label mixed into the handshake's initial transcript hash
/// (spec §6: "fixed ASCII constant"). Chosen to match the chip's
/// documented Noise-style protocol name.
const PROTOCOL_NAME: &[u8] = b"Noise_KNpsk0_25519_AESGCM_SHA256";

/// Directional session keys and counters established by a successful
/// handshake (spec §3 data model).
#[derive(Zeroize)]
pub struct Established {
    pub(crate) k_cmd: [u8; 32],
    pub(crate) k_res: [u8; 32],
    pub(crate) n_cmd: u64,
    pub(crate) n_res: u64,
}

impl Established {
    #[cfg(any(test, feature = "test-util"))]
    pub fn is_zeroed(&self) -> bool {
        self.k_cmd == [0u8; 32]
            && self.k_res == [0u8; 32]
            && self.n_cmd == 0
            && self.n_res == 0
    }

    /// `(n_cmd, n_res)`, exposed only for tests exercising the counter
    /// monotonicity invariant from the outside (spec §8 scenario 2).
    #[cfg(any(test, feature = "test-util"))]
    pub fn counters(&self) -> (u64, u64) {
        (self.n_cmd, self.n_res)
    }
}

/// L3 session lifecycle (spec §3 data model).
pub enum Session {
    Idle,
    Handshaking,
    Established(Established),
}

impl Default for Session {
    fn default() -> Self {
        Session::Idle
    }
}

impl Session {
    /// Force the session back to `Idle`, zeroing any key material held in
    /// the `Established` variant first (spec §3 invariant: "After any
    /// framing, CRC, tag, mode, or status error, the session state is
    /// forced to Idle and key material is zeroed before returning the
    /// error").
    pub fn terminate(&mut self) {
        if let Session::Established(ref mut est) = self {
            est.zeroize();
        }
        *self = Session::Idle;
    }

    pub fn is_established(&self) -> bool {
        matches!(self, Session::Established(_))
    }

    /// `Established`'s counters, or `None` outside that state (spec §8
    /// scenario 2: "n_cmd == n_res == 1").
    #[cfg(any(test, feature = "test-util"))]
    pub fn established_counters(&self) -> Option<(u64, u64)> {
        match self {
            Session::Established(est) => Some(est.counters()),
            _ => None,
        }
    }
}

/// Run the handshake (spec §4.3 steps 1-5) against pairing slot
/// `pairing_slot`, using `pairing_priv`/`pairing_pub` as the host's
/// long-term keypair for that slot and `chip_static_pub` as the chip's
/// long-term public key (obtained from the certificate chain — see
/// [`crate::commands::certs`]).
///
/// On success, transitions `session` to `Established` with both counters
/// at zero. On any failure, `session` is left (or forced) `Idle` and all
/// scratch key material is zeroed before the error is returned.
#[allow(clippy::too_many_arguments)]
pub fn start_session<P: Port, C: Crypto>(
    port: &mut P,
    crypto: &C,
    session: &mut Session,
    pairing_slot: u8,
    pairing_priv: &[u8; 32],
    pairing_pub: &[u8; 32],
    chip_static_pub: &[u8; 32],
    cfg: PollConfig,
) -> Result<()> {
    if pairing_slot >= NUM_PAIRING_SLOTS {
        return Err(Error::Argument(ArgumentError::SlotOutOfRange));
    }

    *session = Session::Handshaking;

    let result = run_handshake(
        port,
        crypto,
        pairing_slot,
        pairing_priv,
        pairing_pub,
        chip_static_pub,
        cfg,
    );

    match result {
        Ok(established) => {
            *session = Session::Established(established);
            Ok(())
        }
        Err(e) => {
            session.terminate();
            Err(e)
        }
    }
}

fn run_handshake<P: Port, C: Crypto>(
    port: &mut P,
    crypto: &C,
    pairing_slot: u8,
    pairing_priv: &[u8; 32],
    pairing_pub: &[u8; 32],
    chip_static_pub: &[u8; 32],
    cfg: PollConfig,
) -> Result<Established> {
    let mut eh_priv = [0u8; 32];
    port.random(&mut eh_priv)?;
    // X25519 clamping: real Crypto backends clamp internally; this crate's
    // trait takes raw scalars and leaves clamping to the implementation,
    // matching how `x25519-dalek`'s `StaticSecret::from` handles it.
    let eh_pub = crypto.x25519(&eh_priv, &BASEPOINT);

    let mut dst = [0u8; 64];
    let rsp = l2::handshake_request(port, &eh_pub, pairing_slot, &mut dst, cfg)?;
    if rsp.len() != 48 {
        eh_priv.zeroize();
        return Err(Error::Session(SessionError::HandshakeFailed));
    }
    let mut et_pub = [0u8; 32];
    et_pub.copy_from_slice(&rsp[..32]);
    let mut chip_tag = [0u8; 16];
    chip_tag.copy_from_slice(&rsp[32..48]);

    let mut dh1 = crypto.x25519(&eh_priv, chip_static_pub);
    let mut dh2 = crypto.x25519(pairing_priv, &et_pub);
    let mut dh3 = crypto.x25519(&eh_priv, &et_pub);
    eh_priv.zeroize();

    let mut h_state = crypto.sha256_init();
    crypto.sha256_update(&mut h_state, PROTOCOL_NAME);
    crypto.sha256_update(&mut h_state, chip_static_pub);
    crypto.sha256_update(&mut h_state, &eh_pub);
    crypto.sha256_update(&mut h_state, pairing_pub);
    crypto.sha256_update(&mut h_state, &et_pub);
    let h = crypto.sha256_final(h_state);

    let mut ck = h;
    for dh in [dh1, dh2, dh3] {
        let mut next_ck = [0u8; 32];
        crypto.hkdf(&dh, &ck, b"", &mut next_ck);
        ck = next_ck;
    }

    let mut keys = [0u8; 64];
    crypto.hkdf(&[], &ck, b"", &mut keys);
    let mut k_cmd = [0u8; 32];
    let mut k_res = [0u8; 32];
    k_cmd.copy_from_slice(&keys[..32]);
    k_res.copy_from_slice(&keys[32..64]);
    keys.zeroize();

    let expected_tag = crypto.sha256(&ck);
    let tag_ok = constant_time_eq(&expected_tag[..16], &chip_tag);

    dh1.zeroize();
    dh2.zeroize();
    dh3.zeroize();
    ck.zeroize();

    if !tag_ok {
        k_cmd.zeroize();
        k_res.zeroize();
        return Err(Error::Session(SessionError::HandshakeFailed));
    }

    Ok(Established {
        k_cmd,
        k_res,
        n_cmd: 0,
        n_res: 0,
    })
}

/// The X25519 base point, used to derive a public key from the host's
/// freshly generated ephemeral private scalar.
const BASEPOINT: [u8; 32] = {
    let mut bp = [0u8; 32];
    bp[0] = 9;
    bp
};

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Encode a 64-bit counter as the 96-bit little-endian nonce AES-GCM
/// expects (spec §4.3: "nonce is the 96-bit little-endian representation
/// of n_cmd/n_res").
fn nonce_from_counter(counter: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..8].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// Largest command body this crate's typed command surface ever passes to
/// [`send_command`] — not just a command's own data but a `slot` prefix
/// where one exists (spec §4.3: `ping(buf <= 4096)`, `ecc_eddsa_sign(slot,
/// msg <= 4096)`, whose framed request body is `slot:2 || msg:4096`).
pub const MAX_L3_CMD_BODY: usize = 2 + 4096;

/// `cmd_id:1` plus [`MAX_L3_CMD_BODY`] (spec §4.3 "Framed commands"). Must
/// cover the full `ping` boundary of exactly 4096 bytes (spec §8) with room
/// left over for the `cmd_id` byte, and `ecc_eddsa_sign`'s larger
/// slot-prefixed body.
pub const MAX_L3_PAYLOAD: usize = 1 + MAX_L3_CMD_BODY;

pub const MAX_L3_FRAME: usize = 2 + MAX_L3_PAYLOAD + 16;

/// Send one encrypted, sequenced L3 command and return its decrypted
/// response payload (spec §4.3 "Framed commands").
///
/// `cmd_id` and `cmd_payload` are encrypted together as `cmd_id ||
/// cmd_payload` under `k_cmd`/`n_cmd`; the response is decrypted under
/// `k_res`/`n_res`. Both counters advance by exactly one only after a
/// fully successful round trip (spec §8 "Counter monotonicity", scenario
/// 3: "no implicit counter advance on failed receive").
///
/// Any tag mismatch, decrypt failure, counter-wrap, or L2
/// `TAG_ERR`/`NO_SESSION`/`HSK_ERR` status terminates the session (spec
/// §4.3 "Counter and tag policy").
pub fn send_command<'a, P: Port, C: Crypto>(
    port: &mut P,
    crypto: &C,
    session: &mut Session,
    cmd_id: u8,
    cmd_payload: &[u8],
    dst: &'a mut [u8],
    cfg: PollConfig,
) -> Result<&'a [u8]> {
    if !session.is_established() {
        return Err(Error::Session(SessionError::NoSession));
    }

    match send_command_established(port, crypto, session, cmd_id, cmd_payload, dst, cfg) {
        Ok(len) => Ok(&dst[..len]),
        Err(e) => {
            if terminates_session(&e) {
                session.terminate();
            }
            Err(e)
        }
    }
}

fn terminates_session(e: &Error) -> bool {
    matches!(
        e,
        Error::Session(_) | Error::Protocol(crate::error::ProtocolError::BadChipMode)
    )
}

fn send_command_established<P: Port, C: Crypto>(
    port: &mut P,
    crypto: &C,
    session: &mut Session,
    cmd_id: u8,
    cmd_payload: &[u8],
    dst: &mut [u8],
    cfg: PollConfig,
) -> Result<usize> {
    let (k_cmd, k_res, n_cmd, n_res) = match session {
        Session::Established(est) => (est.k_cmd, est.k_res, est.n_cmd, est.n_res),
        _ => return Err(Error::Session(SessionError::NoSession)),
    };

    if n_cmd == u64::MAX || n_res == u64::MAX {
        return Err(Error::Session(SessionError::CounterExhausted));
    }

    if 1 + cmd_payload.len() > MAX_L3_PAYLOAD {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }

    let mut plaintext = [0u8; MAX_L3_PAYLOAD];
    plaintext[0] = cmd_id;
    plaintext[1..1 + cmd_payload.len()].copy_from_slice(cmd_payload);
    let plain_len = 1 + cmd_payload.len();

    let mut frame = [0u8; MAX_L3_FRAME];
    frame[..2].copy_from_slice(&(plain_len as u16).to_le_bytes());
    let nonce = nonce_from_counter(n_cmd);
    let tag = crypto.aes256gcm_encrypt(
        &k_cmd,
        &nonce,
        &[],
        &plaintext[..plain_len],
        &mut frame[2..2 + plain_len],
    );
    frame[2 + plain_len..2 + plain_len + 16].copy_from_slice(&tag);
    plaintext[..plain_len].zeroize();

    let req_frame_len = 2 + plain_len + 16;
    let mut l2_dst = [0u8; MAX_L3_FRAME];
    let rsp = l2::encrypted_cmd(port, &frame[..req_frame_len], &mut l2_dst, cfg)?;

    if rsp.len() < 2 {
        return Err(Error::Session(SessionError::DecryptFailed));
    }
    let rsp_len = u16::from_le_bytes([rsp[0], rsp[1]]) as usize;
    if rsp.len() < 2 + rsp_len + 16 {
        return Err(Error::Session(SessionError::DecryptFailed));
    }
    let ciphertext = &rsp[2..2 + rsp_len];
    let mut rsp_tag = [0u8; 16];
    rsp_tag.copy_from_slice(&rsp[2 + rsp_len..2 + rsp_len + 16]);

    // rsp_len is chip-controlled; bound it against our own buffer before
    // it's ever used to slice `decrypted`.
    if rsp_len == 0 || rsp_len > MAX_L3_PAYLOAD {
        return Err(Error::Session(SessionError::DecryptFailed));
    }
    if rsp_len - 1 > dst.len() {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }

    let res_nonce = nonce_from_counter(n_res);
    let mut decrypted = [0u8; MAX_L3_PAYLOAD];
    crypto
        .aes256gcm_decrypt(&k_res, &res_nonce, &[], ciphertext, &rsp_tag, &mut decrypted[..rsp_len])
        .map_err(|_| Error::Session(SessionError::TagMismatch))?;

    let status_byte = decrypted[0];
    let body_len = rsp_len - 1;
    dst[..body_len].copy_from_slice(&decrypted[1..rsp_len]);
    decrypted[..rsp_len].zeroize();

    if let Session::Established(est) = session {
        est.n_cmd += 1;
        est.n_res += 1;
    }

    if status_byte != 0 {
        return Err(map_chip_status(status_byte));
    }

    Ok(body_len)
}

/// In-band cleartext status byte prefixing every decrypted L3 response
/// (spec §1: "in-band cleartext status byte"). Zero means success; any
/// other value maps to a typed [`crate::error::ChipResult`].
fn map_chip_status(byte: u8) -> Error {
    use crate::error::ChipResult;
    Error::Chip(match byte {
        0x01 => ChipResult::SlotEmpty,
        0x02 => ChipResult::SlotWriteFailed,
        0x03 => ChipResult::InvalidSignature,
        0x04 => ChipResult::MCounterExhausted,
        0x05 => ChipResult::SlotLocked,
        _ => ChipResult::SlotWriteFailed,
    })
}

/// Tell the chip to discard its session state, then force the local
/// session to `Idle` regardless of the chip's reply (spec §4.3 "abort" —
/// callers must re-establish either way).
pub fn abort_session<P: Port>(port: &mut P, session: &mut Session, cfg: PollConfig) -> Result<()> {
    let was_established = session.is_established();
    session.terminate();
    if was_established {
        l2::encrypted_session_abort(port, cfg)?;
    }
    Ok(())
}
