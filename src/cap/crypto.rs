// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cryptographic-primitive capability (spec §6, component C2).
//!
//! Actual X25519, SHA-256, HKDF and AES-256-GCM implementations are out of
//! this crate's scope; L3 only ever calls through this trait. Taking
//! `Crypto` as a generic bound on [`crate::Context`] rather than a `dyn`
//! object keeps the handshake and framing code monomorphized per concrete
//! backend (spec §9's "keep the ABI monomorphizable").

/// Session-establishment and record-layer primitives consumed by L3.
///
/// All key material passed across this boundary is the caller's to manage;
/// this crate zeroes its own copies (see [`crate::l3::Session::terminate`])
/// but never reaches into a `Crypto` implementation's internals to do so.
pub trait Crypto {
    /// Opaque streaming SHA-256 state. `Default` seeds the initial state.
    type Sha256State: Default;

    /// Start (or reset) a SHA-256 streaming computation.
    fn sha256_init(&self) -> Self::Sha256State {
        Self::Sha256State::default()
    }

    /// Feed `data` into an in-progress SHA-256 computation.
    fn sha256_update(&self, state: &mut Self::Sha256State, data: &[u8]);

    /// Finalize a SHA-256 computation, consuming its state.
    fn sha256_final(&self, state: Self::Sha256State) -> [u8; 32];

    /// One-shot SHA-256 over a single buffer.
    fn sha256(&self, data: &[u8]) -> [u8; 32] {
        let mut state = self.sha256_init();
        self.sha256_update(&mut state, data);
        self.sha256_final(state)
    }

    /// Constant-time X25519 scalar multiplication: `priv_key` applied to
    /// `public_key`, returning the shared secret.
    fn x25519(&self, priv_key: &[u8; 32], public_key: &[u8; 32]) -> [u8; 32];

    /// Derive `okm.len()` bytes of output keying material via HKDF-SHA256.
    fn hkdf(&self, ikm: &[u8], salt: &[u8], info: &[u8], okm: &mut [u8]);

    /// AES-256-GCM encrypt `plaintext` into `ciphertext` (same length),
    /// returning the 16-byte authentication tag.
    fn aes256gcm_encrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        aad: &[u8],
        plaintext: &[u8],
        ciphertext: &mut [u8],
    ) -> [u8; 16];

    /// AES-256-GCM decrypt `ciphertext` into `plaintext` (same length),
    /// verifying against `tag`. Returns `Err(())` on tag mismatch or
    /// internal decrypt failure; the caller (L3) is responsible for
    /// distinguishing those per spec §7 and terminating the session.
    fn aes256gcm_decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8; 16],
        plaintext: &mut [u8],
    ) -> Result<(), ()>;
}
