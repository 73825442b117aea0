// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The chip's CRC16 variant (spec §4.1): polynomial 0x8005, initial value
//! 0x0000, reflected in and out, no final XOR. That parameter set is the
//! well-known CRC-16/ARC algorithm, so this wraps the `crc` crate's table
//! implementation rather than hand-rolling the bit-shifting loop — the
//! same approach `drv-sprot-api` takes for its own frame CRC (there,
//! CRC-16/XMODEM; here, the chip's documented variant is ARC).

use crc::{Crc, CRC_16_ARC};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Compute the frame CRC16 over `data`, little-endian on the wire.
pub fn checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Append `checksum(data)` to `data` as two little-endian bytes, returning
/// the new total length. `buf` must have at least `data.len() + 2` bytes of
/// capacity starting at `data`'s start; this writes into `buf[..len+2]`.
pub fn append(buf: &mut [u8], len: usize) -> usize {
    let crc = checksum(&buf[..len]).to_le_bytes();
    buf[len] = crc[0];
    buf[len + 1] = crc[1];
    len + 2
}

/// Verify that the two little-endian bytes at `data[data.len()-2..]` match
/// the CRC16 of the bytes preceding them.
pub fn verify(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    let (body, trailer) = data.split_at(data.len() - 2);
    let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
    checksum(body) == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vector_empty() {
        // CRC-16/ARC of the empty message is 0x0000.
        assert_eq!(checksum(&[]), 0x0000);
    }

    #[test]
    fn known_vector_ascii_check() {
        // The canonical "123456789" check string for CRC-16/ARC is 0xBB3D.
        assert_eq!(checksum(b"123456789"), 0xBB3D);
    }

    proptest! {
        #[test]
        fn round_trip_recovers_payload(data in proptest::collection::vec(any::<u8>(), 0..=254)) {
            let mut buf = [0u8; 256];
            buf[..data.len()].copy_from_slice(&data);
            let total = append(&mut buf, data.len());
            prop_assert!(verify(&buf[..total]));
            prop_assert_eq!(&buf[..data.len()], &data[..]);
        }

        #[test]
        fn single_bit_flip_detected(
            data in proptest::collection::vec(any::<u8>(), 1..=254),
            flip_byte_idx in 0usize..254,
            flip_bit in 0u8..8,
        ) {
            let mut buf = [0u8; 256];
            buf[..data.len()].copy_from_slice(&data);
            let total = append(&mut buf, data.len());
            let flip_idx = flip_byte_idx % total;
            buf[flip_idx] ^= 1 << flip_bit;
            prop_assert!(!verify(&buf[..total]));
        }
    }
}
