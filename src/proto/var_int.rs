use std::marker::Unpin;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::ProtocolError;

const SEGMENT_BITS: u8 = 0b0111_1111;
const CONTINUE_BIT: u8 = 0b1000_0000;
const OVERFLOW_BITS: u8 = 0b0111_0000;

/// A var int never spans more than this many bytes
pub const MAX_LENGTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt {
    pub value: i32,
    pub length: usize,
}

/// Parse in a var int and return the value and its length
#[tracing::instrument(level = "trace", skip_all)]
pub async fn read(stream: &mut (dyn AsyncRead + Unpin + Send)) -> Result<VarInt, ProtocolError> {
    let mut length = 0;
    let mut result: u32 = 0;

    loop {
        let read = stream.read_u8().await?;

        // The last group only has room for the top four bits of a 32 bit value
        if length == MAX_LENGTH - 1 && (read & OVERFLOW_BITS) != 0 {
            return Err(ProtocolError::VarIntTooLarge);
        }

        result |= u32::from(read & SEGMENT_BITS) << (7 * length);
        length += 1;

        if (read & CONTINUE_BIT) == 0 {
            break;
        }

        if length == MAX_LENGTH {
            return Err(ProtocolError::VarIntTooLarge);
        }
    }

    Ok(VarInt {
        value: result as i32,
        length,
    })
}

/// Convert an integer to a var int.
///
/// Negative values are written as their two's complement bit pattern and so
/// always take five bytes.
#[tracing::instrument(level = "trace")]
pub fn write(value: i32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_LENGTH);
    let mut remaining = value as u32;

    loop {
        let segment = (remaining & u32::from(SEGMENT_BITS)) as u8;
        remaining >>= 7;

        if remaining == 0 {
            buf.push(segment);
            break;
        }

        buf.push(segment | CONTINUE_BIT);
    }

    buf
}
