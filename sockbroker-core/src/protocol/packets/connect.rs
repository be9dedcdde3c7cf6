use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::{
    expect_consumed, read_binary, read_string, read_u16, read_u8, write_binary, write_string,
};
use crate::protocol::{PacketType, ProtocolError, QoS};
use crate::topics::validate_topic_name;

pub const MQTT_PROTOCOL_NAME: &str = "MQTT";
pub const MQISDP_PROTOCOL_NAME: &str = "MQIsdp";
pub const MQTT_3_1_PROTOCOL_LEVEL: u8 = 3;
pub const MQTT_3_1_1_PROTOCOL_LEVEL: u8 = 4;

/// Protocol name carried in the CONNECT variable header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolName {
    /// `MQTT`, used by 3.1.1
    Mqtt,
    /// `MQIsdp`, used by 3.1
    MqIsdp,
}

impl ProtocolName {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolName::Mqtt => MQTT_PROTOCOL_NAME,
            ProtocolName::MqIsdp => MQISDP_PROTOCOL_NAME,
        }
    }

    /// Protocol level that belongs with this name.
    pub const fn level(self) -> u8 {
        match self {
            ProtocolName::Mqtt => MQTT_3_1_1_PROTOCOL_LEVEL,
            ProtocolName::MqIsdp => MQTT_3_1_PROTOCOL_LEVEL,
        }
    }

    fn parse(name: &str) -> Result<Self, ProtocolError> {
        match name {
            MQTT_PROTOCOL_NAME => Ok(ProtocolName::Mqtt),
            MQISDP_PROTOCOL_NAME => Ok(ProtocolName::MqIsdp),
            _ => Err(ProtocolError::InvalidProtocolName),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ConnectFlags(u8);

impl ConnectFlags {
    pub const RESERVED: Self = Self(0b_0000_0001);
    pub const CLEAN_SESSION: Self = Self(0b_0000_0010);
    pub const WILL_FLAG: Self = Self(0b_0000_0100);
    pub const WILL_QOS_MASK: Self = Self(0b_0001_1000);
    pub const WILL_RETAIN: Self = Self(0b_0010_0000);
    pub const PASSWORD: Self = Self(0b_0100_0000);
    pub const USERNAME: Self = Self(0b_1000_0000);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
    pub const fn empty() -> Self {
        Self(0)
    }
    pub const fn bits(self) -> u8 {
        self.0
    }
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
    pub const fn will_qos_bits(self) -> u8 {
        (self.0 & Self::WILL_QOS_MASK.0) >> 3
    }
    pub fn set_will_qos(&mut self, qos: QoS) {
        self.0 = (self.0 & !Self::WILL_QOS_MASK.0) | ((qos as u8) << 3);
    }
}

/// Message the broker publishes for the client on an abnormal disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// CONNECT packet
///
/// ```text
///   variable header:  protocol name, protocol level, connect flags, keep alive
///   payload:          client id, [will topic, will message], [username], [password]
/// ```
///
/// The protocol level is kept as received; whether it is acceptable, and
/// whether it matches the protocol name, is decided at admission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    pub protocol_name: ProtocolName,
    pub protocol_level: u8,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

impl ConnectPacket {
    /// A clean-session 3.1.1 CONNECT with no will and no credentials.
    pub fn new(client_id: impl Into<String>, keep_alive: u16) -> Self {
        Self {
            protocol_name: ProtocolName::Mqtt,
            protocol_level: MQTT_3_1_1_PROTOCOL_LEVEL,
            clean_session: true,
            keep_alive,
            client_id: client_id.into(),
            will: None,
            username: None,
            password: None,
        }
    }

    pub fn connect_flags(&self) -> ConnectFlags {
        let mut flags = ConnectFlags::empty();
        if self.clean_session {
            flags.insert(ConnectFlags::CLEAN_SESSION);
        }
        if let Some(will) = &self.will {
            flags.insert(ConnectFlags::WILL_FLAG);
            flags.set_will_qos(will.qos);
            if will.retain {
                flags.insert(ConnectFlags::WILL_RETAIN);
            }
        }
        if self.username.is_some() {
            flags.insert(ConnectFlags::USERNAME);
        }
        if self.password.is_some() {
            flags.insert(ConnectFlags::PASSWORD);
        }
        flags
    }
}

impl PacketTypeConst for ConnectPacket {
    const PACKET_TYPE: PacketType = PacketType::Connect;
}

impl PacketFlagsConst for ConnectPacket {
    const PACKET_FLAGS: u8 = 0b0000;
}

impl PacketEncoder for ConnectPacket {
    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        write_string(self.protocol_name.as_str(), buffer)?;
        buffer.put_u8(self.protocol_level);
        buffer.put_u8(self.connect_flags().bits());
        buffer.put_u16(self.keep_alive);

        write_string(&self.client_id, buffer)?;
        if let Some(will) = &self.will {
            write_string(&will.topic, buffer)?;
            write_binary(&will.message, buffer)?;
        }
        if let Some(username) = &self.username {
            write_string(username, buffer)?;
        }
        if let Some(password) = &self.password {
            write_binary(password, buffer)?;
        }
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        let mut offset = 0;

        let protocol_name = ProtocolName::parse(read_string(bytes, &mut offset)?)?;
        let protocol_level = read_u8(bytes, &mut offset)?;

        let flags_byte = read_u8(bytes, &mut offset)?;
        let flags = ConnectFlags::from_bits(flags_byte);
        let invalid_flags = ProtocolError::InvalidConnectFlags { flags: flags_byte };
        if flags.contains(ConnectFlags::RESERVED) {
            return Err(invalid_flags);
        }
        let will_flag = flags.contains(ConnectFlags::WILL_FLAG);
        if !will_flag && flags.intersects(ConnectFlags::WILL_QOS_MASK) {
            return Err(invalid_flags);
        }
        if !will_flag && flags.contains(ConnectFlags::WILL_RETAIN) {
            return Err(invalid_flags);
        }
        let username_flag = flags.contains(ConnectFlags::USERNAME);
        let password_flag = flags.contains(ConnectFlags::PASSWORD);
        if password_flag && !username_flag {
            return Err(invalid_flags);
        }

        let keep_alive = read_u16(bytes, &mut offset)?;
        let client_id = read_string(bytes, &mut offset)?.to_owned();

        let will = if will_flag {
            let qos = QoS::from_u8(flags.will_qos_bits())?;
            let topic = read_string(bytes, &mut offset)?;
            validate_topic_name(topic)?;
            let topic = topic.to_owned();
            let message = Bytes::copy_from_slice(read_binary(bytes, &mut offset)?);
            Some(LastWill {
                topic,
                message,
                qos,
                retain: flags.contains(ConnectFlags::WILL_RETAIN),
            })
        } else {
            None
        };

        let username = if username_flag {
            Some(read_string(bytes, &mut offset)?.to_owned())
        } else {
            None
        };
        let password = if password_flag {
            Some(Bytes::copy_from_slice(read_binary(bytes, &mut offset)?))
        } else {
            None
        };

        expect_consumed(bytes, offset)?;

        Ok(Self {
            protocol_name,
            protocol_level,
            clean_session: flags.contains(ConnectFlags::CLEAN_SESSION),
            keep_alive,
            client_id,
            will,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packets::Packet;

    fn decode(bytes: &[u8]) -> Result<ConnectPacket, ProtocolError> {
        match Packet::decode(bytes)? {
            Packet::Connect(packet) => Ok(packet),
            other => panic!("expected CONNECT, got {:?}", other),
        }
    }

    // ===== VALID PACKETS =====

    #[test]
    fn test_decode_minimal_v4() {
        let bytes = [
            0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x00,
        ];
        let packet = decode(&bytes).unwrap();
        assert_eq!(packet.protocol_name, ProtocolName::Mqtt);
        assert_eq!(packet.protocol_level, 4);
        assert!(packet.clean_session);
        assert_eq!(packet.keep_alive, 60);
        assert_eq!(packet.client_id, "");
        assert!(packet.will.is_none());
        assert!(packet.username.is_none());
        assert!(packet.password.is_none());
    }

    #[test]
    fn test_decode_v3_mqisdp() {
        let bytes = [
            0x10, 0x11, 0x00, 0x06, b'M', b'Q', b'I', b's', b'd', b'p', 0x03, 0x02, 0x00, 0x0A,
            0x00, 0x03, b'a', b'b', b'c',
        ];
        let packet = decode(&bytes).unwrap();
        assert_eq!(packet.protocol_name, ProtocolName::MqIsdp);
        assert_eq!(packet.protocol_level, 3);
        assert_eq!(packet.client_id, "abc");
    }

    #[test]
    fn test_decode_with_will_and_credentials() {
        let packet = ConnectPacket {
            will: Some(LastWill {
                topic: "bye".into(),
                message: Bytes::from_static(b"gone"),
                qos: QoS::ExactlyOnce,
                retain: false,
            }),
            username: Some("alice".into()),
            password: Some(Bytes::from_static(b"pw")),
            ..ConnectPacket::new("dev", 0)
        };
        let bytes = Packet::Connect(packet.clone()).encode().unwrap();
        // clean | will | will qos 2 | password | username
        assert_eq!(bytes[9], 0b1101_0110);
        assert_eq!(decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_unknown_level_is_kept() {
        let bytes = [
            0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x05, 0x02, 0x00, 0x3C, 0x00, 0x00,
        ];
        assert_eq!(decode(&bytes).unwrap().protocol_level, 5);
    }

    // ===== INVALID PACKETS =====

    #[test]
    fn test_invalid_protocol_name() {
        let bytes = [
            0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'X', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x00,
        ];
        assert_eq!(decode(&bytes), Err(ProtocolError::InvalidProtocolName));
    }

    #[test]
    fn test_reserved_flag_set() {
        let bytes = [
            0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x03, 0x00, 0x3C, 0x00, 0x00,
        ];
        assert_eq!(
            decode(&bytes),
            Err(ProtocolError::InvalidConnectFlags { flags: 0x03 })
        );
    }

    #[test]
    fn test_will_qos_without_will_flag() {
        let bytes = [
            0x10, 0x0C, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x0A, 0x00, 0x3C, 0x00, 0x00,
        ];
        assert_eq!(
            decode(&bytes),
            Err(ProtocolError::InvalidConnectFlags { flags: 0x0A })
        );
    }

    #[test]
    fn test_password_without_username() {
        let bytes = [
            0x10, 0x10, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x42, 0x00, 0x3C, 0x00, 0x00,
            0x00, 0x02, b'p', b'w',
        ];
        assert_eq!(
            decode(&bytes),
            Err(ProtocolError::InvalidConnectFlags { flags: 0x42 })
        );
    }

    #[test]
    fn test_trailing_bytes() {
        let bytes = [
            0x10, 0x0E, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x00,
            0xAA, 0xBB,
        ];
        assert_eq!(
            decode(&bytes),
            Err(ProtocolError::InvalidPacketLength {
                expected: 12,
                actual: 14
            })
        );
    }

    #[test]
    fn test_will_qos_three() {
        let bytes = [
            0x10, 0x12, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x1E, 0x00, 0x3C, 0x00, 0x00,
            0x00, 0x01, b't', 0x00, 0x01, b'm',
        ];
        assert_eq!(
            decode(&bytes),
            Err(ProtocolError::InvalidQosLevel { level: 3 })
        );
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = [
            0x10, 0x0B, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00,
        ];
        assert_eq!(decode(&bytes), Err(ProtocolError::IncompletePacket));
    }
}
