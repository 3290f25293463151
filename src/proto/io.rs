use std::marker::Unpin;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::proto::{
    packet::{
        response::StatusPayload, HANDSHAKE_ID, PING_ID, PONG_ID, STATUS_NEXT_STATE,
        STATUS_REQUEST_ID, STATUS_RESPONSE_ID,
    },
    string, var_int, Handshake, Packet, ProtocolError,
};

/// Largest length a packet may declare, the biggest value a three byte var int holds
pub const MAX_PACKET_LENGTH: usize = 2_097_151;

/// Build a complete frame: `var_int(length) | var_int(id) | data`
pub fn frame_packet(id: i32, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let ser_id = var_int::write(id);
    let length = data.len() + ser_id.len();
    if length > MAX_PACKET_LENGTH {
        return Err(ProtocolError::InvalidLength(length as i64));
    }

    // Bounded by MAX_PACKET_LENGTH above
    let mut frame = var_int::write(length as i32);
    frame.reserve(length);
    frame.extend_from_slice(&ser_id);
    frame.extend_from_slice(data);

    Ok(frame)
}

/// Write a packet as one contiguous write
#[tracing::instrument(level = "trace", skip(stream, data), fields(len = data.len()))]
pub async fn write_packet(
    stream: &mut (dyn AsyncWrite + Unpin + Send),
    id: i32,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let frame = frame_packet(id, data)?;

    stream.write_all(&frame).await?;
    stream.flush().await?;

    Ok(())
}

/// Read a packet and output its data
#[tracing::instrument(level = "trace", skip(stream))]
pub async fn read_packet(
    stream: &mut (dyn AsyncRead + Unpin + Send),
) -> Result<Packet, ProtocolError> {
    let length = var_int::read(stream).await?.value;
    let declared = usize::try_from(length)
        .ok()
        .filter(|length| (1..=MAX_PACKET_LENGTH).contains(length))
        .ok_or(ProtocolError::InvalidLength(length.into()))?;

    let id = var_int::read(stream).await?;
    let data_length = declared
        .checked_sub(id.length)
        .ok_or(ProtocolError::InvalidLength(length.into()))?;

    let mut data = vec![0u8; data_length];
    stream.read_exact(&mut data).await?;

    tracing::trace!(id = id.value, length, "packet received");

    Ok(Packet {
        length,
        id: id.value,
        data,
    })
}

fn expect_id(packet: &Packet, expected: i32) -> Result<(), ProtocolError> {
    if packet.id == expected {
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedPacket {
            expected,
            actual: packet.id,
        })
    }
}

#[tracing::instrument(level = "trace", skip(stream), fields(address = %handshake.address))]
pub async fn write_handshake(
    stream: &mut (dyn AsyncWrite + Unpin + Send),
    handshake: &Handshake,
) -> Result<(), ProtocolError> {
    let mut data = var_int::write(handshake.protocol_version);
    data.extend(string::write(handshake.address.as_ref())?);
    data.extend_from_slice(&handshake.port.to_be_bytes());
    data.extend(var_int::write(STATUS_NEXT_STATE));

    write_packet(stream, HANDSHAKE_ID, &data).await
}

#[tracing::instrument(level = "trace", skip(stream))]
pub async fn write_status_request(
    stream: &mut (dyn AsyncWrite + Unpin + Send),
) -> Result<(), ProtocolError> {
    write_packet(stream, STATUS_REQUEST_ID, &[]).await
}

/// Decode the body of a status response packet: `var_int(json length) | utf8(json)`
#[tracing::instrument(level = "trace", skip_all, fields(id = packet.id, length = packet.length))]
pub async fn parse_status_response(packet: &Packet) -> Result<StatusPayload, ProtocolError> {
    expect_id(packet, STATUS_RESPONSE_ID)?;

    let mut data_buf = packet.data.as_slice();
    let response = string::read(&mut data_buf).await?;

    Ok(serde_json::from_str(&response)?)
}

#[tracing::instrument(level = "trace", skip(stream))]
pub async fn write_ping(
    stream: &mut (dyn AsyncWrite + Unpin + Send),
    payload: i64,
) -> Result<(), ProtocolError> {
    write_packet(stream, PING_ID, &payload.to_be_bytes()).await
}

/// Decode the echoed timestamp out of a pong packet
#[tracing::instrument(level = "trace", skip_all, fields(id = packet.id, length = packet.length))]
pub async fn parse_pong(packet: &Packet) -> Result<i64, ProtocolError> {
    expect_id(packet, PONG_ID)?;

    let mut data_buf = packet.data.as_slice();

    Ok(data_buf.read_i64().await?)
}
