use bytes::BytesMut;

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::expect_consumed;
use crate::protocol::{PacketType, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingReqPacket;

impl PacketTypeConst for PingReqPacket {
    const PACKET_TYPE: PacketType = PacketType::PingReq;
}

impl PacketFlagsConst for PingReqPacket {
    const PACKET_FLAGS: u8 = 0b0000;
}

impl PacketEncoder for PingReqPacket {
    fn encode_body(&self, _buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        expect_consumed(bytes, 0)?;
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packets::Packet;

    #[test]
    fn test_decode() {
        assert_eq!(
            Packet::decode(&[0xC0, 0x00]),
            Ok(Packet::PingReq(PingReqPacket))
        );
    }

    #[test]
    fn test_decode_with_body() {
        assert_eq!(
            Packet::decode(&[0xC0, 0x01, 0x00]),
            Err(ProtocolError::InvalidPacketLength {
                expected: 0,
                actual: 1
            })
        );
    }
}
