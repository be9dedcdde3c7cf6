use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsDynamic, PacketTypeConst};
use crate::protocol::utils::{read_packet_id, read_string, write_string};
use crate::protocol::{PacketType, ProtocolError, QoS};
use crate::topics::validate_topic_name;

/// PUBLISH packet
///
/// Flags carry DUP (bit 3), QoS (bits 2-1) and RETAIN (bit 0). The packet
/// identifier is present only for QoS 1 and 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub topic_name: String,
    pub packet_id: Option<u16>,
    pub payload: Bytes,
    pub qos: QoS,
    pub dup: bool,
    pub retain: bool,
}

impl PublishPacket {
    /// A QoS 0 message with no flags set.
    pub fn new(topic_name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic_name: topic_name.into(),
            packet_id: None,
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            dup: false,
            retain: false,
        }
    }
}

impl PacketTypeConst for PublishPacket {
    const PACKET_TYPE: PacketType = PacketType::Publish;
}

impl PacketFlagsDynamic for PublishPacket {
    fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << 1;
        if self.dup {
            flags |= 0b1000;
        }
        if self.retain {
            flags |= 0b0001;
        }
        flags
    }
}

impl PacketEncoder for PublishPacket {
    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        write_string(&self.topic_name, buffer)?;
        match (self.qos, self.packet_id) {
            (QoS::AtMostOnce, None) => {}
            (QoS::AtMostOnce, Some(_)) => return Err(ProtocolError::UnexpectedPacketId),
            (_, None) | (_, Some(0)) => return Err(ProtocolError::MissingPacketId),
            (_, Some(packet_id)) => buffer.put_u16(packet_id),
        }
        buffer.put_slice(&self.payload);
        Ok(())
    }

    fn decode_body(bytes: &[u8], header: u8) -> Result<Self, ProtocolError> {
        let qos = QoS::from_u8((header >> 1) & 0b11)?;
        let dup = header & 0b1000 != 0;
        let retain = header & 0b0001 != 0;

        let mut offset = 0;
        let topic_name = read_string(bytes, &mut offset)?;
        validate_topic_name(topic_name)?;
        let topic_name = topic_name.to_owned();

        let packet_id = if qos > QoS::AtMostOnce {
            Some(read_packet_id(bytes, &mut offset)?)
        } else {
            None
        };

        let payload = Bytes::copy_from_slice(&bytes[offset..]);

        Ok(Self {
            topic_name,
            packet_id,
            payload,
            qos,
            dup,
            retain,
        })
    }
}
