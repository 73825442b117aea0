// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property coverage for [`tropic_host::l2::parse_response_chunk_fuzz`]
//! against arbitrary byte sequences (spec §8: "Fuzz target... must never
//! panic or read out of bounds").

use proptest::prelude::*;
use tropic_host::l2::parse_response_chunk_fuzz;

proptest! {
    /// No input, however malformed, panics or reads past what was given.
    #[test]
    fn never_panics_on_arbitrary_bytes(raw in proptest::collection::vec(any::<u8>(), 0..=260)) {
        let _ = parse_response_chunk_fuzz(&raw);
    }

    /// A result is only ever returned when the claimed length actually fits
    /// the buffer and the trailing CRC16 over the claimed frame checks out;
    /// the parser never fabricates a length the input can't back up.
    #[test]
    fn accepted_frames_are_internally_consistent(raw in proptest::collection::vec(any::<u8>(), 0..=260)) {
        if let Some((_, _, rsp_len)) = parse_response_chunk_fuzz(&raw) {
            prop_assert!(rsp_len <= 252);
            let frame_len = 3 + rsp_len + 2;
            prop_assert!(frame_len <= raw.len());
        }
    }

    /// Any buffer shorter than the minimum possible frame (status + status +
    /// len + crc16, zero-length payload) is always rejected.
    #[test]
    fn too_short_always_rejected(raw in proptest::collection::vec(any::<u8>(), 0..=4)) {
        prop_assert_eq!(parse_response_chunk_fuzz(&raw), None);
    }
}
