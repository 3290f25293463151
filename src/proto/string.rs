use std::marker::Unpin;

use tokio::io::{AsyncRead, AsyncReadExt};

use super::{var_int, ProtocolError};

/// Generate a UTF 8 string with a var int size prefix
#[tracing::instrument(level = "trace")]
pub fn write(string: &str) -> Result<Vec<u8>, ProtocolError> {
    let length = i32::try_from(string.len()).map_err(|_| {
        ProtocolError::InvalidLength(i64::try_from(string.len()).unwrap_or(i64::MAX))
    })?;

    let mut string_vec = var_int::write(length);
    string_vec.extend_from_slice(string.as_bytes());

    Ok(string_vec)
}

/// Read a UTF 8 string with a var int size prefix
#[tracing::instrument(level = "trace", skip_all)]
pub async fn read(stream: &mut (dyn AsyncRead + Unpin + Send)) -> Result<String, ProtocolError> {
    let length = var_int::read(stream).await?.value;

    read_exact(stream, length).await
}

/// Read exactly `length` bytes and decode them as UTF 8
#[tracing::instrument(level = "trace", skip(stream))]
pub async fn read_exact(
    stream: &mut (dyn AsyncRead + Unpin + Send),
    length: i32,
) -> Result<String, ProtocolError> {
    let length = usize::try_from(length).map_err(|_| ProtocolError::InvalidLength(length.into()))?;

    // Grow with the data rather than trusting the prefix for the allocation size
    let mut buf = Vec::with_capacity(length.min(super::io::MAX_PACKET_LENGTH));
    let read = (&mut *stream)
        .take(length as u64)
        .read_to_end(&mut buf)
        .await?;
    if read != length {
        return Err(ProtocolError::UnexpectedEof);
    }

    Ok(String::from_utf8(buf)?)
}
