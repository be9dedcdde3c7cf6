mod error;
mod header;
mod packet_type;
pub mod packets;
mod qos;
pub mod utils;

pub use error::{FrameError, ProtocolError};
pub use header::FixedHeader;
pub use packet_type::PacketType;
pub use qos::QoS;
