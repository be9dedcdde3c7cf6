mod connack;
mod connect;
mod disconnect;
mod pingreq;
mod pingresp;
mod puback;
mod pubcomp;
mod publish;
mod pubrec;
mod pubrel;
mod suback;
mod subscribe;
mod unsuback;
mod unsubscribe;

pub use crate::protocol::packets::connack::{ConnAckPacket, ConnectReturnCode};
pub use crate::protocol::packets::connect::{
    ConnectFlags, ConnectPacket, LastWill, ProtocolName, MQISDP_PROTOCOL_NAME, MQTT_3_1_1_PROTOCOL_LEVEL,
    MQTT_3_1_PROTOCOL_LEVEL, MQTT_PROTOCOL_NAME,
};
pub use crate::protocol::packets::disconnect::DisconnectPacket;
pub use crate::protocol::packets::pingreq::PingReqPacket;
pub use crate::protocol::packets::pingresp::PingRespPacket;
pub use crate::protocol::packets::puback::PubAckPacket;
pub use crate::protocol::packets::pubcomp::PubCompPacket;
pub use crate::protocol::packets::publish::PublishPacket;
pub use crate::protocol::packets::pubrec::PubRecPacket;
pub use crate::protocol::packets::pubrel::PubRelPacket;
pub use crate::protocol::packets::suback::{SubAckPacket, SubAckReturnCode};
pub use crate::protocol::packets::subscribe::{SubscribePacket, Subscription};
pub use crate::protocol::packets::unsuback::UnsubAckPacket;
pub use crate::protocol::packets::unsubscribe::UnsubscribePacket;

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::utils::write_variable_length;
use crate::protocol::{FixedHeader, PacketType, ProtocolError};

pub trait PacketTypeConst {
    const PACKET_TYPE: PacketType;
}

pub trait PacketFlagsConst {
    const PACKET_FLAGS: u8;
}

pub trait PacketFlagsDynamic {
    fn flags(&self) -> u8;
}

impl<T: PacketFlagsConst> PacketFlagsDynamic for T {
    fn flags(&self) -> u8 {
        T::PACKET_FLAGS
    }
}

/// Body codec for one control packet type.
///
/// Implementors read and write everything after the fixed header; the
/// fixed header itself is produced by [`PacketEncoder::encode`] and consumed
/// by [`Packet::decode`].
pub trait PacketEncoder: PacketTypeConst + PacketFlagsDynamic + Sized {
    fn header_first_byte(&self) -> u8 {
        ((Self::PACKET_TYPE as u8) << 4) | (self.flags() & 0x0F)
    }

    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError>;

    fn decode_body(body: &[u8], header: u8) -> Result<Self, ProtocolError>;

    fn encode(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        let mut body = BytesMut::new();
        self.encode_body(&mut body)?;
        buffer.put_u8(self.header_first_byte());
        write_variable_length(body.len(), buffer)?;
        buffer.extend_from_slice(&body);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPacket),
    ConnAck(ConnAckPacket),
    Publish(PublishPacket),
    PubAck(PubAckPacket),
    PubRec(PubRecPacket),
    PubRel(PubRelPacket),
    PubComp(PubCompPacket),
    Subscribe(SubscribePacket),
    SubAck(SubAckPacket),
    Unsubscribe(UnsubscribePacket),
    UnsubAck(UnsubAckPacket),
    PingReq(PingReqPacket),
    PingResp(PingRespPacket),
    Disconnect(DisconnectPacket),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnAck(_) => PacketType::ConnAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PubAck(_) => PacketType::PubAck,
            Packet::PubRec(_) => PacketType::PubRec,
            Packet::PubRel(_) => PacketType::PubRel,
            Packet::PubComp(_) => PacketType::PubComp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubAck(_) => PacketType::SubAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubAck(_) => PacketType::UnsubAck,
            Packet::PingReq(_) => PacketType::PingReq,
            Packet::PingResp(_) => PacketType::PingResp,
            Packet::Disconnect(_) => PacketType::Disconnect,
        }
    }

    /// Decode one complete frame, exactly as the tokenizer emitted it.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let header = FixedHeader::parse(bytes)?.ok_or(ProtocolError::IncompletePacket)?;
        let packet_type = PacketType::from_u8(header.first_byte).ok_or(
            ProtocolError::InvalidPacketType {
                packet_type: header.first_byte >> 4,
            },
        )?;
        if let Some(expected) = packet_type.required_flags() {
            if header.flags() != expected {
                return Err(ProtocolError::InvalidFixedHeaderFlags {
                    expected,
                    actual: header.flags(),
                });
            }
        }
        if bytes.len() != header.frame_length() {
            return Err(ProtocolError::InvalidPacketLength {
                expected: header.frame_length(),
                actual: bytes.len(),
            });
        }

        let body = &bytes[header.header_length..];
        let first_byte = header.first_byte;
        let packet = match packet_type {
            PacketType::Connect => Packet::Connect(ConnectPacket::decode_body(body, first_byte)?),
            PacketType::ConnAck => Packet::ConnAck(ConnAckPacket::decode_body(body, first_byte)?),
            PacketType::Publish => Packet::Publish(PublishPacket::decode_body(body, first_byte)?),
            PacketType::PubAck => Packet::PubAck(PubAckPacket::decode_body(body, first_byte)?),
            PacketType::PubRec => Packet::PubRec(PubRecPacket::decode_body(body, first_byte)?),
            PacketType::PubRel => Packet::PubRel(PubRelPacket::decode_body(body, first_byte)?),
            PacketType::PubComp => Packet::PubComp(PubCompPacket::decode_body(body, first_byte)?),
            PacketType::Subscribe => {
                Packet::Subscribe(SubscribePacket::decode_body(body, first_byte)?)
            }
            PacketType::SubAck => Packet::SubAck(SubAckPacket::decode_body(body, first_byte)?),
            PacketType::Unsubscribe => {
                Packet::Unsubscribe(UnsubscribePacket::decode_body(body, first_byte)?)
            }
            PacketType::UnsubAck => {
                Packet::UnsubAck(UnsubAckPacket::decode_body(body, first_byte)?)
            }
            PacketType::PingReq => Packet::PingReq(PingReqPacket::decode_body(body, first_byte)?),
            PacketType::PingResp => {
                Packet::PingResp(PingRespPacket::decode_body(body, first_byte)?)
            }
            PacketType::Disconnect => {
                Packet::Disconnect(DisconnectPacket::decode_body(body, first_byte)?)
            }
        };
        Ok(packet)
    }

    pub fn encode_into(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            Packet::Connect(packet) => packet.encode(buffer),
            Packet::ConnAck(packet) => packet.encode(buffer),
            Packet::Publish(packet) => packet.encode(buffer),
            Packet::PubAck(packet) => packet.encode(buffer),
            Packet::PubRec(packet) => packet.encode(buffer),
            Packet::PubRel(packet) => packet.encode(buffer),
            Packet::PubComp(packet) => packet.encode(buffer),
            Packet::Subscribe(packet) => packet.encode(buffer),
            Packet::SubAck(packet) => packet.encode(buffer),
            Packet::Unsubscribe(packet) => packet.encode(buffer),
            Packet::UnsubAck(packet) => packet.encode(buffer),
            Packet::PingReq(packet) => packet.encode(buffer),
            Packet::PingResp(packet) => packet.encode(buffer),
            Packet::Disconnect(packet) => packet.encode(buffer),
        }
    }

    /// Encode into a standalone frame.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut buffer = BytesMut::new();
        self.encode_into(&mut buffer)?;
        Ok(buffer.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::QoS;

    #[test]
    fn test_decode_rejects_reserved_type() {
        assert_eq!(
            Packet::decode(&[0x00, 0x00]),
            Err(ProtocolError::InvalidPacketType { packet_type: 0 })
        );
        assert_eq!(
            Packet::decode(&[0xF0, 0x00]),
            Err(ProtocolError::InvalidPacketType { packet_type: 15 })
        );
    }

    #[test]
    fn test_decode_rejects_bad_fixed_flags() {
        // SUBSCRIBE must carry 0010
        let bytes = [0x80, 0x06, 0x00, 0x01, 0x00, 0x01, 0x61, 0x00];
        assert_eq!(
            Packet::decode(&bytes),
            Err(ProtocolError::InvalidFixedHeaderFlags {
                expected: 0b0010,
                actual: 0b0000
            })
        );
        // PINGREQ must carry 0000
        assert!(matches!(
            Packet::decode(&[0xC1, 0x00]),
            Err(ProtocolError::InvalidFixedHeaderFlags { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_frame_length_mismatch() {
        assert_eq!(
            Packet::decode(&[0x40, 0x02, 0x00]),
            Err(ProtocolError::InvalidPacketLength {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_decode_truncated_header() {
        assert_eq!(Packet::decode(&[]), Err(ProtocolError::IncompletePacket));
        assert_eq!(Packet::decode(&[0xC0]), Err(ProtocolError::IncompletePacket));
    }

    #[test]
    fn test_encode_server_replies() {
        let cases: [(Packet, &[u8]); 7] = [
            (
                Packet::ConnAck(ConnAckPacket::accepted()),
                &[0x20, 0x02, 0x00, 0x00],
            ),
            (
                Packet::PubAck(PubAckPacket { packet_id: 7 }),
                &[0x40, 0x02, 0x00, 0x07],
            ),
            (
                Packet::PubRec(PubRecPacket { packet_id: 9 }),
                &[0x50, 0x02, 0x00, 0x09],
            ),
            (
                Packet::PubRel(PubRelPacket { packet_id: 9 }),
                &[0x62, 0x02, 0x00, 0x09],
            ),
            (
                Packet::PubComp(PubCompPacket { packet_id: 9 }),
                &[0x70, 0x02, 0x00, 0x09],
            ),
            (
                Packet::UnsubAck(UnsubAckPacket { packet_id: 3 }),
                &[0xB0, 0x02, 0x00, 0x03],
            ),
            (Packet::PingResp(PingRespPacket), &[0xD0, 0x00]),
        ];
        for (packet, expected) in cases {
            assert_eq!(packet.encode().unwrap().as_ref(), expected, "{packet:?}");
        }
    }

    #[test]
    fn test_roundtrip_every_packet_type() {
        let packets = [
            Packet::Connect(ConnectPacket {
                protocol_name: ProtocolName::Mqtt,
                protocol_level: 4,
                clean_session: false,
                keep_alive: 30,
                client_id: "client-1".into(),
                will: Some(LastWill {
                    topic: "status/client-1".into(),
                    message: Bytes::from_static(b"offline"),
                    qos: QoS::AtLeastOnce,
                    retain: true,
                }),
                username: Some("user".into()),
                password: Some(Bytes::from_static(b"secret")),
            }),
            Packet::ConnAck(ConnAckPacket {
                session_present: true,
                return_code: ConnectReturnCode::NotAuthorized,
            }),
            Packet::Publish(PublishPacket {
                topic_name: "a/b".into(),
                packet_id: Some(42),
                payload: Bytes::from_static(b"payload"),
                qos: QoS::ExactlyOnce,
                dup: true,
                retain: true,
            }),
            Packet::PubAck(PubAckPacket { packet_id: 1 }),
            Packet::PubRec(PubRecPacket { packet_id: 2 }),
            Packet::PubRel(PubRelPacket { packet_id: 3 }),
            Packet::PubComp(PubCompPacket { packet_id: 4 }),
            Packet::Subscribe(SubscribePacket {
                packet_id: 5,
                subscriptions: vec![
                    Subscription::new("a/+", QoS::AtMostOnce),
                    Subscription::new("b/#", QoS::ExactlyOnce),
                ],
            }),
            Packet::SubAck(SubAckPacket {
                packet_id: 5,
                return_codes: vec![
                    SubAckReturnCode::Success(QoS::AtMostOnce),
                    SubAckReturnCode::Failure,
                ],
            }),
            Packet::Unsubscribe(UnsubscribePacket {
                packet_id: 6,
                topic_filters: vec!["a/+".into(), "b/#".into()],
            }),
            Packet::UnsubAck(UnsubAckPacket { packet_id: 6 }),
            Packet::PingReq(PingReqPacket),
            Packet::PingResp(PingRespPacket),
            Packet::Disconnect(DisconnectPacket),
        ];
        for packet in packets {
            let bytes = packet.encode().unwrap();
            assert_eq!(Packet::decode(&bytes).unwrap(), packet);
        }
    }

    #[test]
    fn test_encode_large_publish_uses_multibyte_length() {
        let packet = Packet::Publish(PublishPacket {
            topic_name: "t".into(),
            packet_id: None,
            payload: Bytes::from(vec![0xAB; 200]),
            qos: QoS::AtMostOnce,
            dup: false,
            retain: false,
        });
        let bytes = packet.encode().unwrap();
        // 2 + 1 + 200 = 203 = 0xCB 0x01
        assert_eq!(&bytes[..3], &[0x30, 0xCB, 0x01]);
        assert_eq!(bytes.len(), 3 + 203);
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }
}
