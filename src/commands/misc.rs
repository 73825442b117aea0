// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Miscellaneous typed commands: echo, chip-seeded RNG pass-through, and
//! the chip's serial code (spec §4.3 `ping`, `random_bytes`,
//! `serial_code_get`).

use super::{check_len, dispatch, CommandId};
use crate::cap::{Crypto, Port};
use crate::context::Context;
use crate::error::{ArgumentError, Error, Result};

/// Largest `ping` payload the wire allows (spec §4.3: "ping(buf ≤ 4096)").
pub const MAX_PING_LEN: usize = 4096;
/// Largest single `random_bytes` request (spec §4.3: "random_bytes(n ≤
/// 255)").
pub const MAX_RANDOM_LEN: usize = 255;

/// Round-trip `buf` through the chip and return the echoed bytes (spec
/// §4.3 `ping`).
pub fn ping<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    buf: &[u8],
) -> Result<heapless::Vec<u8, MAX_PING_LEN>> {
    check_len(buf.len(), MAX_PING_LEN)?;
    let rsp = dispatch(ctx, CommandId::Ping, buf)?;
    if rsp.len() != buf.len() {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut out = heapless::Vec::new();
    out.extend_from_slice(rsp).ok();
    Ok(out)
}

/// Request `n` bytes from the chip's RNG (spec §4.3 `random_bytes`).
pub fn random_bytes<P: Port, C: Crypto>(
    ctx: &mut Context<'_, P, C>,
    n: usize,
) -> Result<heapless::Vec<u8, MAX_RANDOM_LEN>> {
    check_len(n, MAX_RANDOM_LEN)?;
    let rsp = dispatch(ctx, CommandId::Random, &[n as u8])?;
    if rsp.len() != n {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut out = heapless::Vec::new();
    out.extend_from_slice(rsp).ok();
    Ok(out)
}

/// Read the chip's fixed serial code (spec §4.3 `serial_code_get`).
pub fn serial_code_get<P: Port, C: Crypto>(ctx: &mut Context<'_, P, C>) -> Result<[u8; 16]> {
    let rsp = dispatch(ctx, CommandId::SerialCodeGet, &[])?;
    if rsp.len() != 16 {
        return Err(Error::Argument(ArgumentError::LengthOutOfRange));
    }
    let mut code = [0u8; 16];
    code.copy_from_slice(rsp);
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Timeouts};
    use crate::mock::{MockCrypto, MockPort};

    #[test]
    fn ping_rejects_oversized_buffer() {
        let port = MockPort::new();
        let mut ctx = Context::new(port, MockCrypto::new(), Timeouts::default());
        let buf = [0u8; MAX_PING_LEN + 1];
        let err = ping(&mut ctx, &buf).unwrap_err();
        assert_eq!(err, Error::Argument(ArgumentError::LengthOutOfRange));
    }

    #[test]
    fn random_bytes_rejects_oversized_request() {
        let port = MockPort::new();
        let mut ctx = Context::new(port, MockCrypto::new(), Timeouts::default());
        let err = random_bytes(&mut ctx, MAX_RANDOM_LEN + 1).unwrap_err();
        assert_eq!(err, Error::Argument(ArgumentError::LengthOutOfRange));
    }
}
