use bytes::{BufMut, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::{expect_consumed, read_packet_id};
use crate::protocol::{PacketType, ProtocolError};

/// Acknowledges a QoS 1 PUBLISH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAckPacket {
    pub packet_id: u16,
}

impl PacketTypeConst for PubAckPacket {
    const PACKET_TYPE: PacketType = PacketType::PubAck;
}

impl PacketFlagsConst for PubAckPacket {
    const PACKET_FLAGS: u8 = 0b0000;
}

impl PacketEncoder for PubAckPacket {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packets::Packet;

    #[test]
    fn test_decode() {
        assert_eq!(
            Packet::decode(&[0x40, 0x02, 0x00, 0x07]),
            Ok(Packet::PubAck(PubAckPacket { packet_id: 7 }))
        );
    }

    #[test]
    fn test_decode_wrong_length() {
        assert_eq!(
            Packet::decode(&[0x40, 0x03, 0x00, 0x07, 0x00]),
            Err(ProtocolError::InvalidPacketLength {
                expected: 2,
                actual: 3
            })
        );
        assert_eq!(
            Packet::decode(&[0x40, 0x01, 0x00]),
            Err(ProtocolError::IncompletePacket)
        );
    }

    #[test]
    fn test_decode_zero_packet_id() {
        assert_eq!(
            Packet::decode(&[0x40, 0x02, 0x00, 0x00]),
            Err(ProtocolError::MissingPacketId)
        );
    }
}
