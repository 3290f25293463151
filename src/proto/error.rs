use std::{
    fmt::{self, Display, Formatter},
    io,
    string::FromUtf8Error,
};

/// Failure to decode (or frame) protocol data
#[derive(Debug)]
pub enum ProtocolError {
    /// A var int ran past its fifth byte
    VarIntTooLarge,
    /// The source ran dry before the value was complete
    UnexpectedEof,
    /// A length prefix that is negative or larger than the protocol allows
    InvalidLength(i64),
    /// String bytes that are not UTF-8
    InvalidUtf8(FromUtf8Error),
    /// A well framed packet that is not the one the exchange expects next
    UnexpectedPacket { expected: i32, actual: i32 },
    /// A status payload that is not a valid status document
    Json(serde_json::Error),
    /// Any other transport fault
    Io(io::Error),
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::VarIntTooLarge => write!(f, "var int is too big"),
            ProtocolError::UnexpectedEof => write!(f, "unexpected end of stream"),
            ProtocolError::InvalidLength(length) => write!(f, "invalid length prefix {length}"),
            ProtocolError::InvalidUtf8(error) => write!(f, "string is not valid utf-8: {error}"),
            ProtocolError::UnexpectedPacket { expected, actual } => write!(
                f,
                "expected packet 0x{expected:02X} but received 0x{actual:02X}"
            ),
            ProtocolError::Json(error) => write!(f, "malformed status json: {error}"),
            ProtocolError::Io(error) => Display::fmt(error, f),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::InvalidUtf8(error) => Some(error),
            ProtocolError::Json(error) => Some(error),
            ProtocolError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => ProtocolError::UnexpectedEof,
            _ => ProtocolError::Io(error),
        }
    }
}

impl From<FromUtf8Error> for ProtocolError {
    fn from(error: FromUtf8Error) -> Self {
        ProtocolError::InvalidUtf8(error)
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(error: serde_json::Error) -> Self {
        ProtocolError::Json(error)
    }
}
