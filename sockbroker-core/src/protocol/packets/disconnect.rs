use bytes::BytesMut;

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::expect_consumed;
use crate::protocol::{PacketType, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisconnectPacket;

impl PacketTypeConst for DisconnectPacket {
    const PACKET_TYPE: PacketType = PacketType::Disconnect;
}

impl PacketFlagsConst for DisconnectPacket {
    const PACKET_FLAGS: u8 = 0b0000;
}

impl PacketEncoder for DisconnectPacket {
    fn encode_body(&self, _buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        expect_consumed(bytes, 0)?;
        Ok(Self)
    }
}
