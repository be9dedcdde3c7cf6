use bytes::{BufMut, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::{read_packet_id, read_string, read_u8, write_string};
use crate::protocol::{PacketType, ProtocolError, QoS};
use crate::topics::validate_topic_filter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic_filter: String,
    pub requested_qos: QoS,
}

impl Subscription {
    pub fn new(topic_filter: impl Into<String>, requested_qos: QoS) -> Self {
        Self {
            topic_filter: topic_filter.into(),
            requested_qos,
        }
    }
}

/// SUBSCRIBE packet: a packet identifier followed by one or more
/// (topic filter, requested QoS) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePacket {
    pub packet_id: u16,
    pub subscriptions: Vec<Subscription>,
}

impl PacketTypeConst for SubscribePacket {
    const PACKET_TYPE: PacketType = PacketType::Subscribe;
}

impl PacketFlagsConst for SubscribePacket {
    const PACKET_FLAGS: u8 = 0b0010;
}

impl PacketEncoder for SubscribePacket {
    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        buffer.put_u16(self.packet_id);
        for subscription in &self.subscriptions {
            write_string(&subscription.topic_filter, buffer)?;
            buffer.put_u8(subscription.requested_qos as u8);
        }
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        let mut offset = 0;
        let packet_id = read_packet_id(bytes, &mut offset)?;

        let mut subscriptions = Vec::new();
        while offset < bytes.len() {
            let topic_filter = read_string(bytes, &mut offset)?;
            validate_topic_filter(topic_filter)?;
            let topic_filter = topic_filter.to_owned();
            // upper six bits are reserved in 3.1.1
            let requested_qos = QoS::from_u8(read_u8(bytes, &mut offset)?)?;
            subscriptions.push(Subscription {
                topic_filter,
                requested_qos,
            });
        }

        if subscriptions.is_empty() {
            return Err(ProtocolError::NoTopicFilters);
        }

        Ok(Self {
            packet_id,
            subscriptions,
        })
    }
}
