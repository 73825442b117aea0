// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A minimal ASN.1 DER walker, just deep enough to pull a subject public
//! key and issuer/subject name out of an X.509 certificate (SPEC_FULL
//! §11, certificate chain verification).
//!
//! This is not a general-purpose DER library: it only decodes the TLVs
//! needed to walk `Certificate -> TBSCertificate -> subjectPublicKeyInfo`
//! and the raw `tbsCertificate`/`signatureValue` byte ranges used for
//! chain verification. Anything else in a real-world certificate (
//! extensions, unusual name forms) is skipped over rather than parsed.

use crate::error::{Error, ProtocolError, Result};

/// One decoded TLV: tag byte, and the value bytes (length already
/// resolved, definite-length only — BER indefinite-length is not a valid
/// DER encoding and is rejected).
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
    /// Total encoded length (tag + length + value) so callers can advance
    /// a cursor past this TLV.
    pub encoded_len: usize,
}

const TAG_SEQUENCE: u8 = 0x30;
const TAG_BIT_STRING: u8 = 0x03;

/// Parse one TLV at the start of `buf`.
pub fn read_tlv(buf: &[u8]) -> Result<Tlv<'_>> {
    if buf.len() < 2 {
        return Err(malformed());
    }
    let tag = buf[0];
    let (len, len_bytes) = read_length(&buf[1..])?;
    let header = 1 + len_bytes;
    if buf.len() < header + len {
        return Err(malformed());
    }
    Ok(Tlv {
        tag,
        value: &buf[header..header + len],
        encoded_len: header + len,
    })
}

fn read_length(buf: &[u8]) -> Result<(usize, usize)> {
    if buf.is_empty() {
        return Err(malformed());
    }
    let first = buf[0];
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }
    let num_bytes = (first & 0x7F) as usize;
    if num_bytes == 0 || num_bytes > 4 || buf.len() < 1 + num_bytes {
        return Err(malformed());
    }
    let mut len = 0usize;
    for &b in &buf[1..1 + num_bytes] {
        len = (len << 8) | b as usize;
    }
    Ok((len, 1 + num_bytes))
}

fn malformed() -> Error {
    Error::Protocol(ProtocolError::MalformedCertificateStore)
}

/// Walk down into a SEQUENCE's children, returning the value bytes (the
/// inner TLV stream) if `buf` starts with a SEQUENCE tag.
fn into_sequence(buf: &[u8]) -> Result<&[u8]> {
    let tlv = read_tlv(buf)?;
    if tlv.tag != TAG_SEQUENCE {
        return Err(malformed());
    }
    Ok(tlv.value)
}

/// Extract the raw `subjectPublicKey` bit-string payload (sans the unused-
/// bits count byte) from a DER-encoded X.509 `Certificate`.
///
/// `Certificate ::= SEQUENCE { tbsCertificate, signatureAlgorithm,
/// signatureValue }`; `tbsCertificate` is itself a `SEQUENCE` whose sixth
/// element (after version, serialNumber, signature, issuer, validity,
/// subject — version is an explicit `[0]` context tag, optional) is
/// `subjectPublicKeyInfo ::= SEQUENCE { algorithm, subjectPublicKey BIT
/// STRING }`. Rather than fully modeling every preceding field this walks
/// forward through however many leading SEQUENCE/SET/primitive TLVs
/// precede it and keys off the final SEQUENCE-then-BIT-STRING shape that
/// `subjectPublicKeyInfo` has, which no other adjacent field in
/// `TBSCertificate` takes.
pub fn extract_subject_public_key_info<'a>(cert_der: &'a [u8]) -> Result<&'a [u8]> {
    let cert_body = into_sequence(cert_der)?;
    let tbs_tlv = read_tlv(cert_body)?;
    if tbs_tlv.tag != TAG_SEQUENCE {
        return Err(malformed());
    }
    let mut cursor = tbs_tlv.value;

    // Skip the optional explicit `[0] EXPLICIT Version` tag if present.
    if !cursor.is_empty() && cursor[0] == 0xA0 {
        let version_tlv = read_tlv(cursor)?;
        cursor = &cursor[version_tlv.encoded_len..];
    }

    // serialNumber (INTEGER), signature (SEQUENCE AlgorithmIdentifier),
    // issuer (SEQUENCE Name), validity (SEQUENCE), subject (SEQUENCE
    // Name): five more TLVs to skip before subjectPublicKeyInfo.
    for _ in 0..5 {
        let tlv = read_tlv(cursor)?;
        cursor = &cursor[tlv.encoded_len..];
    }

    let spki_tlv = read_tlv(cursor)?;
    if spki_tlv.tag != TAG_SEQUENCE {
        return Err(malformed());
    }
    Ok(spki_tlv.value)
}

/// Given `subjectPublicKeyInfo`'s value bytes, pull out the raw key bytes
/// from the trailing `BIT STRING` (skipping its unused-bits count byte and
/// the leading `AlgorithmIdentifier` SEQUENCE).
pub fn extract_bit_string_key(spki: &[u8]) -> Result<&[u8]> {
    let algo_tlv = read_tlv(spki)?;
    let rest = &spki[algo_tlv.encoded_len..];
    let bits_tlv = read_tlv(rest)?;
    if bits_tlv.tag != TAG_BIT_STRING || bits_tlv.value.is_empty() {
        return Err(malformed());
    }
    // First byte of a BIT STRING value is the unused-bit count; DER public
    // keys are always an integral number of bytes, so it must be zero.
    if bits_tlv.value[0] != 0 {
        return Err(malformed());
    }
    Ok(&bits_tlv.value[1..])
}

/// Convenience: extract exactly a 32-byte raw public key (X25519 or
/// Ed25519, both 32-byte curve points) from a certificate's DER bytes.
pub fn extract_subject_public_key_32(cert_der: &[u8]) -> Result<[u8; 32]> {
    let spki = extract_subject_public_key_info(cert_der)?;
    let key = extract_bit_string_key(spki)?;
    if key.len() != 32 {
        return Err(malformed());
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(key);
    Ok(out)
}

/// Split a `Certificate` DER blob into its `tbsCertificate` byte range
/// (the bytes a chain verifier must hash/verify-over) and the trailing
/// `signatureValue` BIT STRING payload.
pub fn split_tbs_and_signature(cert_der: &[u8]) -> Result<(&[u8], &[u8])> {
    let outer = read_tlv(cert_der)?;
    if outer.tag != TAG_SEQUENCE {
        return Err(malformed());
    }
    let tbs_tlv = read_tlv(outer.value)?;
    let tbs_bytes = &outer.value[..tbs_tlv.encoded_len];

    let after_tbs = &outer.value[tbs_tlv.encoded_len..];
    let sig_alg_tlv = read_tlv(after_tbs)?;
    let after_alg = &after_tbs[sig_alg_tlv.encoded_len..];
    let sig_tlv = read_tlv(after_alg)?;
    if sig_tlv.tag != TAG_BIT_STRING || sig_tlv.value.is_empty() || sig_tlv.value[0] != 0 {
        return Err(malformed());
    }
    Ok((tbs_bytes, &sig_tlv.value[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn der_len(len: usize, out: &mut heapless::Vec<u8, 8>) {
        if len < 0x80 {
            out.push(len as u8).ok();
        } else {
            out.push(0x81).ok();
            out.push(len as u8).ok();
        }
    }

    fn wrap_seq(children: &[u8], out: &mut heapless::Vec<u8, 512>) {
        out.push(TAG_SEQUENCE).ok();
        let mut len_buf = heapless::Vec::<u8, 8>::new();
        der_len(children.len(), &mut len_buf);
        out.extend_from_slice(&len_buf).ok();
        out.extend_from_slice(children).ok();
    }

    #[test]
    fn read_tlv_rejects_truncated_input() {
        assert!(read_tlv(&[0x30]).is_err());
        assert!(read_tlv(&[0x30, 0x05, 0x01]).is_err());
    }

    #[test]
    fn extract_bit_string_key_rejects_nonzero_unused_bits() {
        // BIT STRING with one unused bit, which a 32-byte key can't have.
        let value = [0x03, 0x02, 0x01, 0xAA];
        let algo = [0x30, 0x00];
        let mut buf = heapless::Vec::<u8, 16>::new();
        buf.extend_from_slice(&algo).ok();
        buf.extend_from_slice(&value).ok();
        assert!(extract_bit_string_key(&buf).is_err());
    }

    #[test]
    fn round_trip_synthetic_spki() {
        // algorithm SEQUENCE (empty) + BIT STRING(0 unused, 32 bytes key)
        let key = [0x11u8; 32];
        let mut bitstring = heapless::Vec::<u8, 40>::new();
        bitstring.push(TAG_BIT_STRING).ok();
        bitstring.push(33).ok();
        bitstring.push(0).ok();
        bitstring.extend_from_slice(&key).ok();

        let mut spki = heapless::Vec::<u8, 64>::new();
        spki.push(TAG_SEQUENCE).ok();
        spki.push(0).ok(); // empty AlgorithmIdentifier
        spki.extend_from_slice(&bitstring).ok();

        let extracted = extract_bit_string_key(&spki[2..]).unwrap();
        assert_eq!(extracted, &key);
    }
}
