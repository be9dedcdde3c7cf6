use bytes::{BufMut, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::{expect_consumed, read_packet_id};
use crate::protocol::{PacketType, ProtocolError};

/// Second step of the QoS 2 handshake; bit 1 of the flags is reserved and set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubRelPacket {
    pub packet_id: u16,
}

impl PacketTypeConst for PubRelPacket {
    const PACKET_TYPE: PacketType = PacketType::PubRel;
}

impl PacketFlagsConst for PubRelPacket {
    const PACKET_FLAGS: u8 = 0b0010;
}

impl PacketEncoder for PubRelPacket {
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
            Packet::decode(&[0x62, 0x02, 0x00, 0x09]),
            Ok(Packet::PubRel(PubRelPacket { packet_id: 9 }))
        );
    }

    #[test]
    fn test_decode_without_reserved_bit() {
        assert_eq!(
            Packet::decode(&[0x60, 0x02, 0x00, 0x09]),
            Err(ProtocolError::InvalidFixedHeaderFlags {
                expected: 0b0010,
                actual: 0b0000
            })
        );
    }
}
