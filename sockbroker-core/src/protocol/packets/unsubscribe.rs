use bytes::{BufMut, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::{read_packet_id, read_string, write_string};
use crate::protocol::{PacketType, ProtocolError};
use crate::topics::validate_topic_filter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub packet_id: u16,
    pub topic_filters: Vec<String>,
}

impl PacketTypeConst for UnsubscribePacket {
    const PACKET_TYPE: PacketType = PacketType::Unsubscribe;
}

impl PacketFlagsConst for UnsubscribePacket {
    const PACKET_FLAGS: u8 = 0b0010;
}

impl PacketEncoder for UnsubscribePacket {
    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        buffer.put_u16(self.packet_id);
        for topic_filter in &self.topic_filters {
            write_string(topic_filter, buffer)?;
        }
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        let mut offset = 0;
        let packet_id = read_packet_id(bytes, &mut offset)?;

        let mut topic_filters = Vec::new();
        while offset < bytes.len() {
            let topic_filter = read_string(bytes, &mut offset)?;
            validate_topic_filter(topic_filter)?;
            topic_filters.push(topic_filter.to_owned());
        }

        if topic_filters.is_empty() {
            return Err(ProtocolError::NoTopicFilters);
        }

        Ok(Self {
            packet_id,
            topic_filters,
        })
    }
}
