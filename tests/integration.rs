// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scenarios driven entirely through the public API against
//! the in-memory [`tropic_host::mock`] test doubles, one per literal
//! scenario from spec.md's walkthrough section.
//!
//! Crafting a chip-side reply for anything past the handshake means
//! reproducing the session-key derivation the host performs internally
//! (`k_cmd`/`k_res` are never exposed outside the crate); `handshake_fixture`
//! below mirrors the same Noise-style KDF chain L3 runs, using only
//! `MockCrypto`'s public primitives, so each scenario can queue a reply
//! the host will actually accept. Every additional response a scenario
//! needs is queued on the fixture's `MockPort` before it's handed to
//! `Context::new` (the queue is FIFO and `Context` never exposes the
//! port back out once owned).

use tropic_host::cap::Crypto;
use tropic_host::commands::{self, KeySlot, RMemSlot};
use tropic_host::context::{Context, InitOutcome, Timeouts};
use tropic_host::error::{ArgumentError, Error, SessionError, TransportError};
use tropic_host::l1;
use tropic_host::l2::{ChipMode, Status};
use tropic_host::l3;
use tropic_host::mock::{MockCrypto, MockPort};

/// Matches `l3::BASEPOINT`.
const BASEPOINT: [u8; 32] = {
    let mut bp = [0u8; 32];
    bp[0] = 9;
    bp
};

/// Matches `l3::PROTOCOL_NAME`.
const PROTOCOL_NAME: &[u8] = b"Noise_KNpsk0_25519_AESGCM_SHA256";

/// The deterministic `eh_priv` `MockPort::random` hands the host on a
/// fresh `MockPort` (fill starts at 0x42, steps by 0x11 per byte).
fn expected_eh_priv() -> [u8; 32] {
    let mut eh_priv = [0u8; 32];
    let mut fill = 0x42u8;
    for b in eh_priv.iter_mut() {
        *b = fill;
        fill = fill.wrapping_add(0x11);
    }
    eh_priv
}

struct SessionFixture {
    port: MockPort,
    crypto: MockCrypto,
    pairing_priv: [u8; 32],
    pairing_pub: [u8; 32],
    chip_static_pub: [u8; 32],
    k_cmd: [u8; 32],
    k_res: [u8; 32],
}

/// Build a fresh `MockPort` with the chip's handshake reply already
/// queued, and return the session keys the host will derive from it so
/// a test can queue correctly-keyed command responses of its own before
/// handing the port to `Context::new` (spec §4.3 steps 2-4).
fn handshake_fixture() -> SessionFixture {
    let mut port = MockPort::new();
    let crypto = MockCrypto::new();

    let pairing_priv = [0x11u8; 32];
    let pairing_pub = crypto.x25519(&pairing_priv, &BASEPOINT);
    let chip_static_priv = [0x22u8; 32];
    let chip_static_pub = crypto.x25519(&chip_static_priv, &BASEPOINT);

    let eh_priv = expected_eh_priv();
    let eh_pub = crypto.x25519(&eh_priv, &BASEPOINT);
    let chip_et_priv = [0x33u8; 32];
    let et_pub = crypto.x25519(&chip_et_priv, &BASEPOINT);

    let dh1 = crypto.x25519(&chip_static_priv, &eh_pub);
    let dh2 = crypto.x25519(&chip_et_priv, &pairing_pub);
    let dh3 = crypto.x25519(&chip_et_priv, &eh_pub);

    let mut h_state = crypto.sha256_init();
    crypto.sha256_update(&mut h_state, PROTOCOL_NAME);
    crypto.sha256_update(&mut h_state, &chip_static_pub);
    crypto.sha256_update(&mut h_state, &eh_pub);
    crypto.sha256_update(&mut h_state, &pairing_pub);
    crypto.sha256_update(&mut h_state, &et_pub);
    let h = crypto.sha256_final(h_state);

    let mut ck = h;
    for dh in [dh1, dh2, dh3] {
        let mut next_ck = [0u8; 32];
        crypto.hkdf(&dh, &ck, b"", &mut next_ck);
        ck = next_ck;
    }
    let tag = crypto.sha256(&ck);

    let mut keys = [0u8; 64];
    crypto.hkdf(&[], &ck, b"", &mut keys);
    let mut k_cmd = [0u8; 32];
    let mut k_res = [0u8; 32];
    k_cmd.copy_from_slice(&keys[..32]);
    k_res.copy_from_slice(&keys[32..64]);

    let mut payload = [0u8; 48];
    payload[..32].copy_from_slice(&et_pub);
    payload[32..48].copy_from_slice(&tag[..16]);
    port.queue_response(0x01, Status::ResultOk as u8, &payload);

    SessionFixture {
        port,
        crypto,
        pairing_priv,
        pairing_pub,
        chip_static_pub,
        k_cmd,
        k_res,
    }
}

/// Encrypt `plaintext` (`status_byte || body`) under `key`/`counter` the
/// same way `l3::send_command_established` frames a response, and queue
/// it as the fixture port's next L2 reply.
fn queue_encrypted_response(
    port: &mut MockPort,
    crypto: &MockCrypto,
    key: &[u8; 32],
    counter: u64,
    plaintext: &[u8],
) {
    queue_encrypted_response_maybe_tampered(port, crypto, key, counter, plaintext, false);
}

/// As [`queue_encrypted_response`], but with `tamper_tag` flipping a bit
/// in the AEAD tag after encryption, simulating a corrupted response
/// that passes L1's CRC (spec §8 scenario 4) but fails decryption.
///
/// The resulting L3 frame is split across as many `l1::MAX_PAYLOAD`-byte
/// chunks as it takes (`Status::ResultCont` on every chunk but the last),
/// the same way the real chip streams back a response too large for one
/// L1 frame (spec §4.2 "multi-chunk assembly").
fn queue_encrypted_response_maybe_tampered(
    port: &mut MockPort,
    crypto: &MockCrypto,
    key: &[u8; 32],
    counter: u64,
    plaintext: &[u8],
    tamper_tag: bool,
) {
    let mut nonce = [0u8; 12];
    nonce[..8].copy_from_slice(&counter.to_le_bytes());

    let mut ciphertext = [0u8; l3::MAX_L3_PAYLOAD];
    let mut tag =
        crypto.aes256gcm_encrypt(key, &nonce, &[], plaintext, &mut ciphertext[..plaintext.len()]);
    if tamper_tag {
        tag[0] ^= 0xFF;
    }

    let mut frame = [0u8; l3::MAX_L3_FRAME];
    frame[..2].copy_from_slice(&(plaintext.len() as u16).to_le_bytes());
    frame[2..2 + plaintext.len()].copy_from_slice(&ciphertext[..plaintext.len()]);
    frame[2 + plaintext.len()..2 + plaintext.len() + 16].copy_from_slice(&tag);
    let total = 2 + plaintext.len() + 16;

    queue_chunked_response(port, &frame[..total]);
}

/// Queue an already-framed L2 payload split across multiple
/// `l1::MAX_PAYLOAD`-byte chunks, `Status::ResultCont` on every chunk but
/// the last.
fn queue_chunked_response(port: &mut MockPort, frame: &[u8]) {
    let mut offset = 0;
    loop {
        let end = (offset + l1::MAX_PAYLOAD).min(frame.len());
        let is_last = end == frame.len();
        let status = if is_last { Status::ResultOk } else { Status::ResultCont };
        port.queue_response(0x01, status as u8, &frame[offset..end]);
        if is_last {
            break;
        }
        offset = end;
    }
}

/// Queue the `Status::RequestCont` acknowledgements the chip sends back
/// while the host is still pushing a chunked outgoing L3 request whose
/// framed length is `total_request_len` bytes (spec §4.1/§4.2: one ack per
/// request chunk beyond the first).
fn queue_request_cont_acks(port: &mut MockPort, total_request_len: usize) {
    let num_chunks = (total_request_len + l1::MAX_PAYLOAD - 1) / l1::MAX_PAYLOAD;
    for _ in 0..num_chunks.saturating_sub(1) {
        port.queue_response(0x01, Status::RequestCont as u8, &[]);
    }
}

/// Scenario 1: a chip that reports startup on first read transitions to
/// application mode after `Startup_Req`.
#[test]
fn startup_transitions_to_application() {
    let mut port = MockPort::new();
    port.queue_response(0x01, Status::ResultOk as u8, &[0x01]); // Get_Info(ChipMode): startup
    port.queue_response(0x01, Status::ResultOk as u8, &[]); // Startup_Req terminal status
    port.queue_response(0x01, Status::ResultOk as u8, &[0x04]); // re-read: application

    let mut ctx = Context::new(port, MockCrypto::new(), Timeouts::default());
    let outcome = ctx.init().unwrap();
    assert_eq!(outcome, InitOutcome::Application);
}

/// Scenario 2: after a successful handshake on slot 0, `ping` echoes its
/// input and both counters advance to exactly one.
#[test]
fn ping_echo_after_handshake_advances_both_counters() {
    let mut fx = handshake_fixture();

    let ping_body = [0x01u8, 0x02, 0x03];
    let mut plaintext = [0u8; 4];
    plaintext[0] = 0x00; // in-band success status
    plaintext[1..].copy_from_slice(&ping_body);
    queue_encrypted_response(&mut fx.port, &fx.crypto, &fx.k_res, 0, &plaintext);

    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();
    assert_eq!(ctx.session_counters(), Some((0, 0)));

    let echoed = commands::ping(&mut ctx, &ping_body).unwrap();
    assert_eq!(&echoed[..], &ping_body[..]);
    assert_eq!(ctx.session_counters(), Some((1, 1)));
}

/// Spec §8 boundary: a zero-length ping round-trips trivially, a single
/// L1 frame each way.
#[test]
fn ping_zero_bytes_succeeds() {
    let mut fx = handshake_fixture();

    let plaintext = [0u8; 1]; // in-band success status, empty echo
    queue_encrypted_response(&mut fx.port, &fx.crypto, &fx.k_res, 0, &plaintext);

    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();

    let echoed = commands::ping(&mut ctx, &[]).unwrap();
    assert!(echoed.is_empty());
}

/// Spec §8 boundary: a ping of exactly 4096 bytes succeeds. Its outgoing
/// request frame (`2 + 1 + 4096 + 16` = 4115 bytes) and its echoed
/// response frame are both far bigger than one 252-byte L1 frame, so this
/// is also the literal "framed request exceeds one L1 frame" case.
#[test]
fn ping_4096_bytes_succeeds_with_chunked_request_and_response() {
    let mut fx = handshake_fixture();

    let ping_body = [0x7Au8; 4096];
    let request_frame_len = 2 + 1 + ping_body.len() + 16;
    queue_request_cont_acks(&mut fx.port, request_frame_len);

    let mut plaintext = [0u8; 1 + 4096];
    plaintext[1..].copy_from_slice(&ping_body);
    queue_encrypted_response(&mut fx.port, &fx.crypto, &fx.k_res, 0, &plaintext);

    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();

    let echoed = commands::ping(&mut ctx, &ping_body).unwrap();
    assert_eq!(&echoed[..], &ping_body[..]);
    assert_eq!(ctx.session_counters(), Some((1, 1)));
}

/// Spec §8 boundary: one byte past the maximum is rejected before any
/// I/O runs, so no chip reply needs to be queued at all.
#[test]
fn ping_4097_bytes_rejected_before_any_io() {
    let fx = handshake_fixture();
    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();

    let oversized = [0u8; 4097];
    let err = commands::ping(&mut ctx, &oversized).unwrap_err();
    assert_eq!(err, Error::Argument(ArgumentError::LengthOutOfRange));
}

/// A full 444-byte R-memory record (spec §4.3 `data <= 444`) frames to
/// `2 + 447 + 16 = 465` bytes, over the 252-byte L1 ceiling — the concrete
/// case that motivated request-side chunking in the first place.
#[test]
fn r_mem_data_write_full_record_spans_multiple_request_chunks() {
    let mut fx = handshake_fixture();

    let record = [0x42u8; 444];
    let plain_len = 1 + 2 + record.len(); // cmd_id:1 + slot:2 + data
    let request_frame_len = 2 + plain_len + 16;
    queue_request_cont_acks(&mut fx.port, request_frame_len);

    let plaintext = [0u8; 1]; // in-band success status, no body
    queue_encrypted_response(&mut fx.port, &fx.crypto, &fx.k_res, 0, &plaintext);

    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();

    let slot = RMemSlot::new(0).unwrap();
    commands::r_mem_data_write(&mut ctx, slot, &record).unwrap();
    assert_eq!(ctx.session_counters(), Some((1, 1)));
}

/// Scenario 3: a CRC error on a response retries at the transport layer
/// without tearing down the established session.
#[test]
fn crc_error_leaves_session_established() {
    let mut fx = handshake_fixture();

    let mut plaintext = [0u8; 4];
    plaintext[1..].copy_from_slice(&[0xAA, 0xBB, 0xCC]);
    queue_encrypted_response(&mut fx.port, &fx.crypto, &fx.k_res, 0, &plaintext);
    fx.port.corrupt_next_response_crc();

    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();

    let err = commands::ping(&mut ctx, &[0xAA, 0xBB, 0xCC]).unwrap_err();
    assert_eq!(err, Error::Transport(TransportError::CrcMismatch));
    assert_eq!(ctx.session_counters(), Some((0, 0)));
}

/// Scenario 4: a tampered AEAD tag on a response is rejected and forces
/// the session back to idle, zeroing its key material.
#[test]
fn tag_mismatch_kills_session() {
    let mut fx = handshake_fixture();

    let mut plaintext = [0u8; 4];
    plaintext[1..].copy_from_slice(&[0x01, 0x02, 0x03]);
    queue_encrypted_response_maybe_tampered(
        &mut fx.port,
        &fx.crypto,
        &fx.k_res,
        0,
        &plaintext,
        true,
    );

    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();
    assert!(ctx.session_counters().is_some());

    let err = commands::ping(&mut ctx, &[0x01, 0x02, 0x03]).unwrap_err();
    assert_eq!(err, Error::Session(SessionError::TagMismatch));
    assert!(ctx.session_counters().is_none());
}

/// Scenario 5: an ECDSA signature produced over the secure session can
/// be checked by a caller-supplied [`commands::SignatureVerifier`].
#[test]
fn ecdsa_sign_then_external_verify() {
    let mut fx = handshake_fixture();

    let mut plaintext = [0u8; 65];
    let fake_sig = [0x5Au8; 64];
    plaintext[1..].copy_from_slice(&fake_sig);
    queue_encrypted_response(&mut fx.port, &fx.crypto, &fx.k_res, 0, &plaintext);

    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    ctx.start_session(0, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap();

    let slot = KeySlot::new(0).unwrap();
    let msg_hash = [0x01u8; 32];
    let sig = commands::ecc_ecdsa_sign(&mut ctx, slot, &msg_hash).unwrap();
    assert_eq!(sig, fake_sig);

    struct AlwaysTrue;
    impl commands::SignatureVerifier for AlwaysTrue {
        fn verify(&self, _public_key: &[u8], _message: &[u8], _signature: &[u8]) -> bool {
            true
        }
    }
    assert!(AlwaysTrue.verify(&[0u8; 32], &msg_hash, &sig));
}

/// Scenario 6: a firmware update in maintenance mode, culminating in a
/// reboot back to application mode.
#[test]
fn firmware_update_then_reboot() {
    let mut port = MockPort::new();
    port.queue_response(0x01, Status::ResultOk as u8, &[0x02]); // Get_Info(ChipMode): maintenance
    port.queue_response(0x01, Status::ResultOk as u8, &[]); // Mutable_Fw_Erase_Req
    port.queue_response(0x01, Status::ResultOk as u8, &[]); // Mutable_Fw_Update_Req chunk 1
    port.queue_response(0x01, Status::ResultOk as u8, &[]); // Mutable_Fw_Update_Req chunk 2
    port.queue_response(0x01, Status::ResultOk as u8, &[]); // Startup_Req
    port.queue_response(0x01, Status::ResultOk as u8, &[0x04]); // re-read: application

    let mut ctx = Context::new(port, MockCrypto::new(), Timeouts::default());
    let outcome = ctx.init().unwrap();
    assert_eq!(outcome, InitOutcome::Maintenance);

    commands::erase_bank(&mut ctx, 0).unwrap();
    let image = [0xABu8; 200];
    commands::write_image(&mut ctx, &image).unwrap();
    let mode = commands::reboot(&mut ctx).unwrap();
    assert_eq!(
        mode,
        ChipMode {
            startup: false,
            maintenance: false,
            application: true,
        }
    );
}

#[test]
fn handshake_rejects_slot_out_of_range() {
    let fx = handshake_fixture();
    let mut ctx = Context::new(fx.port, fx.crypto, Timeouts::default());
    let err = ctx
        .start_session(4, &fx.pairing_priv, &fx.pairing_pub, &fx.chip_static_pub)
        .unwrap_err();
    assert_eq!(err, Error::Argument(ArgumentError::SlotOutOfRange));
}
