use mcstatus_model::Hostname;

/// Status response packet structs
pub mod response;

pub const HANDSHAKE_ID: i32 = 0x00;
pub const STATUS_REQUEST_ID: i32 = 0x00;
pub const STATUS_RESPONSE_ID: i32 = 0x00;
pub const PING_ID: i32 = 0x01;
pub const PONG_ID: i32 = 0x01;

/// Next state announced in the handshake, this client only ever asks for status
pub const STATUS_NEXT_STATE: i32 = 1;

/// A single frame read off the wire, length prefix already consumed
#[derive(Debug)]
pub struct Packet {
    /// Length of the id and data together, as declared by the prefix
    pub length: i32,
    pub id: i32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Handshake {
    pub protocol_version: i32,
    pub address: Hostname,
    pub port: u16,
}
