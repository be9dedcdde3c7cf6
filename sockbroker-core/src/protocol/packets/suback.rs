use bytes::{BufMut, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst, SubscribePacket};
use crate::protocol::utils::read_packet_id;
use crate::protocol::{PacketType, ProtocolError, QoS};

const SUBACK_FAILURE: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAckReturnCode {
    Success(QoS),
    Failure,
}

impl SubAckReturnCode {
    pub const fn as_u8(self) -> u8 {
        match self {
            SubAckReturnCode::Success(qos) => qos as u8,
            SubAckReturnCode::Failure => SUBACK_FAILURE,
        }
    }
}

impl TryFrom<u8> for SubAckReturnCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            SUBACK_FAILURE => Ok(SubAckReturnCode::Failure),
            0..=2 => QoS::from_u8(value).map(SubAckReturnCode::Success),
            _ => Err(ProtocolError::InvalidSubAckReturnCode { return_code: value }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAckPacket {
    pub packet_id: u16,
    pub return_codes: Vec<SubAckReturnCode>,
}

impl SubAckPacket {
    /// Grant every subscription at the QoS it asked for, in request order.
    pub fn granting(subscribe: &SubscribePacket) -> Self {
        Self {
            packet_id: subscribe.packet_id,
            return_codes: subscribe
                .subscriptions
                .iter()
                .map(|subscription| SubAckReturnCode::Success(subscription.requested_qos))
                .collect(),
        }
    }
}

impl PacketTypeConst for SubAckPacket {
    const PACKET_TYPE: PacketType = PacketType::SubAck;
}

impl PacketFlagsConst for SubAckPacket {
    const PACKET_FLAGS: u8 = 0b0000;
}

impl PacketEncoder for SubAckPacket {
    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        buffer.put_u16(self.packet_id);
        for code in &self.return_codes {
            buffer.put_u8(code.as_u8());
        }
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        let mut offset = 0;
        let packet_id = read_packet_id(bytes, &mut offset)?;
        let return_codes = bytes[offset..]
            .iter()
            .map(|&code| SubAckReturnCode::try_from(code))
            .collect::<Result<Vec<_>, _>>()?;
        if return_codes.is_empty() {
            return Err(ProtocolError::IncompletePacket);
        }
        Ok(Self {
            packet_id,
            return_codes,
        })
    }
}
