// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Certificate-chain verification (spec §1 "verify the chip's
//! authenticity", §4.2 "Certificate store").
//!
//! The [`Crypto`](crate::cap::Crypto) capability (spec §6) only exposes
//! the session primitives the handshake itself needs — X25519, SHA-256,
//! HKDF, AES-GCM. Verifying an X.509 signature chain needs an
//! ECDSA/EdDSA *verify* operation spec §6 never asks `Crypto` to
//! provide. This module takes that as a second, narrower capability
//! supplied by the caller and used only here, never by L3.

use crate::der;
use crate::error::{Error, ProtocolError, Result};
use crate::l2::CertificateStore;

/// Signature verification consumed only by certificate chain checking.
///
/// Kept separate from [`Crypto`](crate::cap::Crypto) because it is a
/// verify-only, chain-walking concern unrelated to the session's AEAD and
/// key-agreement primitives (SPEC_FULL §11).
pub trait SignatureVerifier {
    /// Verify `signature` over `message` under `public_key`. This crate
    /// always calls with a 32-byte raw curve point (the DER
    /// `subjectPublicKeyInfo`'s extracted key) and the signature bytes
    /// from the certificate's `signatureValue` bit string; dispatching on
    /// curve/algorithm is the implementation's job.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

/// Walk the chip's certificate chain leaf-first (spec §4.2 on-wire
/// order), verifying each certificate's signature under the next
/// certificate's public key, and the final (root) certificate's
/// signature under `trusted_root_pub`.
///
/// Returns the leaf certificate's raw 32-byte subject public key — the
/// chip's long-term static X25519 public key (`ST` in spec §4.3 step 3),
/// which the handshake treats as already authenticated once this
/// succeeds.
pub fn verify_chain<V: SignatureVerifier>(
    store: &CertificateStore<'_>,
    verifier: &V,
    trusted_root_pub: &[u8; 32],
) -> Result<[u8; 32]> {
    let num_certs = store.num_certs();
    if num_certs == 0 {
        return Err(Error::Protocol(ProtocolError::MalformedCertificateStore));
    }

    for i in 0..num_certs {
        let cert = store.cert(i)?;
        let (tbs, signature) = der::split_tbs_and_signature(cert)?;
        let issuer_pub = if i + 1 < num_certs {
            der::extract_subject_public_key_32(store.cert(i + 1)?)?
        } else {
            *trusted_root_pub
        };
        if !verifier.verify(&issuer_pub, tbs, signature) {
            return Err(Error::Protocol(ProtocolError::MalformedCertificateStore));
        }
    }

    der::extract_subject_public_key_32(store.cert(0)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A verifier that accepts everything, so chain-walking (cursor
    /// arithmetic, issuer-key threading, root fallback) can be tested
    /// independent of real cryptography.
    struct AcceptAll;
    impl SignatureVerifier for AcceptAll {
        fn verify(&self, _public_key: &[u8], _message: &[u8], _signature: &[u8]) -> bool {
            true
        }
    }

    struct RejectAll;
    impl SignatureVerifier for RejectAll {
        fn verify(&self, _public_key: &[u8], _message: &[u8], _signature: &[u8]) -> bool {
            false
        }
    }

    fn der_len(len: usize, out: &mut heapless::Vec<u8, 8>) {
        if len < 0x80 {
            out.push(len as u8).ok();
        } else {
            out.push(0x81).ok();
            out.push(len as u8).ok();
        }
    }

    fn wrap_seq(children: &[u8], out: &mut heapless::Vec<u8, 512>) {
        out.push(0x30).ok();
        let mut len_buf = heapless::Vec::<u8, 8>::new();
        der_len(children.len(), &mut len_buf);
        out.extend_from_slice(&len_buf).ok();
        out.extend_from_slice(children).ok();
    }

    /// Build one self-contained `Certificate ::= SEQUENCE { tbs,
    /// sigAlg, sig BIT STRING }` with a synthetic 32-byte subject public
    /// key embedded in `tbs`'s `subjectPublicKeyInfo` slot.
    fn fake_cert(pub_key: [u8; 32]) -> heapless::Vec<u8, 512> {
        // version [0] EXPLICIT (skipped by the walker if absent, so we
        // omit it), serialNumber, signature alg, issuer, validity,
        // subject: five placeholder SEQUENCEs, then subjectPublicKeyInfo.
        let mut placeholder = heapless::Vec::<u8, 16>::new();
        wrap_seq(&[], &mut placeholder);

        let mut tbs_body = heapless::Vec::<u8, 256>::new();
        for _ in 0..5 {
            tbs_body.extend_from_slice(&placeholder).ok();
        }
        // subjectPublicKeyInfo: SEQUENCE { algorithm SEQUENCE {}, subjectPublicKey BIT STRING }
        let mut bitstring = heapless::Vec::<u8, 40>::new();
        bitstring.push(0x03).ok();
        bitstring.push(33).ok();
        bitstring.push(0).ok();
        bitstring.extend_from_slice(&pub_key).ok();
        let mut spki_body = heapless::Vec::<u8, 64>::new();
        spki_body.extend_from_slice(&placeholder).ok();
        spki_body.extend_from_slice(&bitstring).ok();
        let mut spki = heapless::Vec::<u8, 80>::new();
        wrap_seq(&spki_body, &mut spki);
        tbs_body.extend_from_slice(&spki).ok();

        let mut tbs = heapless::Vec::<u8, 256>::new();
        wrap_seq(&tbs_body, &mut tbs);

        // signatureAlgorithm (empty SEQUENCE) + signatureValue BIT STRING
        let mut sig_bitstring = heapless::Vec::<u8, 16>::new();
        sig_bitstring.push(0x03).ok();
        sig_bitstring.push(5).ok();
        sig_bitstring.push(0).ok();
        sig_bitstring.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]).ok();

        let mut cert_body = heapless::Vec::<u8, 512>::new();
        cert_body.extend_from_slice(&tbs).ok();
        cert_body.extend_from_slice(&placeholder).ok();
        cert_body.extend_from_slice(&sig_bitstring).ok();

        let mut cert = heapless::Vec::<u8, 512>::new();
        wrap_seq(&cert_body, &mut cert);
        cert
    }

    #[test]
    fn chain_of_one_verifies_against_root() {
        let leaf_pub = [0x42u8; 32];
        let cert = fake_cert(leaf_pub);

        let mut store_bytes = heapless::Vec::<u8, 1024>::new();
        store_bytes.push(1).ok(); // version
        store_bytes.push(1).ok(); // num_certs
        store_bytes.extend_from_slice(&(cert.len() as u16).to_le_bytes()).ok();
        store_bytes.extend_from_slice(&0u16.to_le_bytes()).ok();
        store_bytes.extend_from_slice(&0u16.to_le_bytes()).ok();
        store_bytes.extend_from_slice(&0u16.to_le_bytes()).ok();
        store_bytes.extend_from_slice(&cert).ok();

        let store = CertificateStore::parse(&store_bytes).unwrap();
        let root = [0u8; 32];
        let key = verify_chain(&store, &AcceptAll, &root).unwrap();
        assert_eq!(key, leaf_pub);
    }

    #[test]
    fn rejecting_verifier_fails_the_chain() {
        let leaf_pub = [0x77u8; 32];
        let cert = fake_cert(leaf_pub);

        let mut store_bytes = heapless::Vec::<u8, 1024>::new();
        store_bytes.push(1).ok();
        store_bytes.push(1).ok();
        store_bytes.extend_from_slice(&(cert.len() as u16).to_le_bytes()).ok();
        store_bytes.extend_from_slice(&0u16.to_le_bytes()).ok();
        store_bytes.extend_from_slice(&0u16.to_le_bytes()).ok();
        store_bytes.extend_from_slice(&0u16.to_le_bytes()).ok();
        store_bytes.extend_from_slice(&cert).ok();

        let store = CertificateStore::parse(&store_bytes).unwrap();
        let root = [0u8; 32];
        assert!(verify_chain(&store, &RejectAll, &root).is_err());
    }
}
