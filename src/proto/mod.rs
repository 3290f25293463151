pub mod error;
pub mod io;
pub mod packet;
pub mod string;
pub mod var_int;

pub use error::ProtocolError;
pub use packet::{response, Handshake, Packet};
