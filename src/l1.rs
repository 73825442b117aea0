// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! L1 transport: frame clocking, CRC16, response polling (spec §4.1,
//! component C3).
//!
//! L1 knows nothing about request/response semantics above the wire: it
//! sends one opaque `opcode | payload` frame per call and hands back one
//! raw response chunk per call. Deciding what an opcode means, what a
//! status byte implies, and whether another chunk needs fetching is L2's
//! job (spec §4.2) — L1 only owns the bus, the CRC, and the poll timing.

use static_assertions::const_assert;

use crate::cap::Port;
use crate::crc16;
use crate::error::{Error, PortError, Result, TransportError};

/// Largest payload L1 will frame, per spec §6.
pub const MAX_PAYLOAD: usize = 252;
/// `opcode(1) + len(1) + payload(≤252) + crc16(2)`.
pub const MAX_REQUEST_FRAME: usize = 1 + 1 + MAX_PAYLOAD + 2;
/// `chip_status(1) + l2_status(1) + rsp_len(1) + payload(≤252) + crc16(2)`.
/// One byte longer than [`MAX_REQUEST_FRAME`]: the response header carries
/// an extra status byte the request header doesn't.
pub const MAX_RESPONSE_FRAME: usize = 1 + 1 + 1 + MAX_PAYLOAD + 2;

// Both frame sizes must fit the one-byte length field they're built
// around (spec §6's 252-byte payload ceiling exists precisely so
// `rsp_len`/`payload_len` never need more than a u8).
const_assert!(MAX_REQUEST_FRAME <= 256);
const_assert!(MAX_RESPONSE_FRAME <= 257);

/// Sentinel chip-status byte meaning "not ready yet"; the only status byte
/// L1 itself interprets, since continuing to poll on it is purely a
/// transport-layer concern (spec §4.1).
pub const STATUS_NO_RESP: u8 = 0xFF;

/// Per-request poll timing (spec §4.1, §5 defaults).
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Delay between successive single-byte poll reads.
    pub poll_interval_ms: u32,
    /// Total time budget for the poll loop before giving up.
    pub poll_deadline_ms: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            poll_interval_ms: 1,
            poll_deadline_ms: 70,
        }
    }
}

/// One raw L1 response chunk, not yet interpreted by L2.
#[derive(Debug, Clone, Copy)]
pub struct ResponseChunk {
    pub chip_status: u8,
    pub l2_status: u8,
    pub len: usize,
    pub data: [u8; MAX_PAYLOAD],
}

impl ResponseChunk {
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// Send one request frame: `opcode:1 | payload_len:1 | payload | crc16:2`.
///
/// Performs one full chip-select cycle: assert, clock the frame out while
/// discarding the simultaneously-clocked-in bytes, release.
pub fn send_request<P: Port>(
    port: &mut P,
    opcode: u8,
    payload: &[u8],
    timeout_ms: u32,
) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::Transport(TransportError::FrameOverlong));
    }

    let mut buf = [0u8; MAX_REQUEST_FRAME];
    buf[0] = opcode;
    buf[1] = payload.len() as u8;
    buf[2..2 + payload.len()].copy_from_slice(payload);
    let total = crc16::append(&mut buf, 2 + payload.len());

    port.cs_low();
    let result = port.spi_transfer(&mut buf[..total], total, timeout_ms);
    port.cs_high();
    result?;
    Ok(())
}

/// Poll for readiness, then clock in one full response chunk.
///
/// Issues single-byte reads (each its own chip-select cycle) separated by
/// `cfg.poll_interval_ms` until a status byte other than
/// [`STATUS_NO_RESP`] appears or `cfg.poll_deadline_ms` elapses, then
/// clocks in the full `chip_status | l2_status | rsp_len | rsp_data |
/// crc16` chunk and validates its CRC.
pub fn get_response_chunk<P: Port>(
    port: &mut P,
    cfg: PollConfig,
) -> Result<ResponseChunk> {
    let mut elapsed_ms = 0u32;
    loop {
        let status = read_status_byte(port, cfg.poll_deadline_ms)?;
        if status != STATUS_NO_RESP {
            break;
        }
        if elapsed_ms >= cfg.poll_deadline_ms {
            return Err(Error::Transport(TransportError::NoResponse));
        }
        port.delay_ms(cfg.poll_interval_ms);
        elapsed_ms += cfg.poll_interval_ms;
    }

    read_full_chunk(port, cfg.poll_deadline_ms)
}

fn read_status_byte<P: Port>(port: &mut P, timeout_ms: u32) -> Result<u8> {
    let mut buf = [0u8; 1];
    port.cs_low();
    let result = port.spi_transfer(&mut buf, 1, timeout_ms);
    port.cs_high();
    result.map_err(transport_bus_error)?;
    Ok(buf[0])
}

fn read_full_chunk<P: Port>(
    port: &mut P,
    timeout_ms: u32,
) -> Result<ResponseChunk> {
    let mut buf = [0u8; MAX_RESPONSE_FRAME];
    // chip_status(1) + l2_status(1) + rsp_len(1) is the minimum we must
    // clock to learn the real length; the chip clocks out the rest (up to
    // MAX_RESPONSE_FRAME) regardless, so we just always read the maximum and
    // trust rsp_len plus the CRC to tell us what's real.
    port.cs_low();
    let result = port.spi_transfer(&mut buf, MAX_RESPONSE_FRAME, timeout_ms);
    port.cs_high();
    result.map_err(transport_bus_error)?;

    let rsp_len = buf[2] as usize;
    if rsp_len > MAX_PAYLOAD {
        return Err(Error::Transport(TransportError::FrameOverlong));
    }
    let frame_len = 3 + rsp_len + 2;
    if !crc16::verify(&buf[..frame_len]) {
        return Err(Error::Transport(TransportError::CrcMismatch));
    }

    let mut data = [0u8; MAX_PAYLOAD];
    data[..rsp_len].copy_from_slice(&buf[3..3 + rsp_len]);

    Ok(ResponseChunk {
        chip_status: buf[0],
        l2_status: buf[1],
        len: rsp_len,
        data,
    })
}

fn transport_bus_error(e: PortError) -> Error {
    Error::Transport(TransportError::SpiBusError(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPort;

    #[test]
    fn request_frame_bound_rejected_over_252() {
        let mut port = MockPort::new();
        let payload = [0u8; 253];
        let err = send_request(&mut port, 0x01, &payload, 70).unwrap_err();
        assert_eq!(
            err,
            Error::Transport(TransportError::FrameOverlong)
        );
    }

    #[test]
    fn request_frame_accepts_exactly_252() {
        let mut port = MockPort::new();
        let payload = [0xAAu8; 252];
        send_request(&mut port, 0x01, &payload, 70).unwrap();
        let sent = port.last_request();
        assert_eq!(sent.len(), MAX_REQUEST_FRAME);
        assert!(crc16::verify(&sent));
    }

    #[test]
    fn response_of_252_accepted_253_rejected() {
        let mut port = MockPort::new();
        port.queue_response(0x01, 0x01, &[0x55u8; 252]);
        let chunk = get_response_chunk(&mut port, PollConfig::default()).unwrap();
        assert_eq!(chunk.len, 252);

        let mut port = MockPort::new();
        port.queue_raw_oversized_response();
        let err = get_response_chunk(&mut port, PollConfig::default()).unwrap_err();
        assert_eq!(err, Error::Transport(TransportError::FrameOverlong));
    }

    #[test]
    fn no_response_within_timeout() {
        let mut port = MockPort::new();
        // Never post a response: every status read returns NO_RESP.
        let cfg = PollConfig {
            poll_interval_ms: 1,
            poll_deadline_ms: 5,
        };
        let err = get_response_chunk(&mut port, cfg).unwrap_err();
        assert_eq!(err, Error::Transport(TransportError::NoResponse));
    }

    #[test]
    fn crc_mismatch_detected() {
        let mut port = MockPort::new();
        port.queue_response(0x01, 0x01, &[0x01, 0x02, 0x03]);
        port.corrupt_next_response_crc();
        let err = get_response_chunk(&mut port, PollConfig::default()).unwrap_err();
        assert_eq!(err, Error::Transport(TransportError::CrcMismatch));
    }
}
