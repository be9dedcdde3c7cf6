use bytes::{BufMut, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::{expect_consumed, read_packet_id};
use crate::protocol::{PacketType, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubAckPacket {
    pub packet_id: u16,
}

impl PacketTypeConst for UnsubAckPacket {
    const PACKET_TYPE: PacketType = PacketType::UnsubAck;
}

impl PacketFlagsConst for UnsubAckPacket {
    const PACKET_FLAGS: u8 = 0b0000;
}

impl PacketEncoder for UnsubAckPacket {
    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        buffer.put_u16(self.packet_id);
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        let mut offset = 0;
        let packet_id = read_packet_id(bytes, &mut offset)?;
        expect_consumed(bytes, offset)?;
        Ok(Self { packet_id })
    }
}
