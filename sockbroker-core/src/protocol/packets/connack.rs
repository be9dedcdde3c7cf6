use bytes::{BufMut, BytesMut};

use crate::protocol::packets::{PacketEncoder, PacketFlagsConst, PacketTypeConst};
use crate::protocol::utils::{expect_consumed, read_u8};
use crate::protocol::{PacketType, ProtocolError};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUserNameOrPassword = 4,
    NotAuthorized = 5,
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ConnectReturnCode::Accepted),
            1 => Ok(ConnectReturnCode::UnacceptableProtocolVersion),
            2 => Ok(ConnectReturnCode::IdentifierRejected),
            3 => Ok(ConnectReturnCode::ServerUnavailable),
            4 => Ok(ConnectReturnCode::BadUserNameOrPassword),
            5 => Ok(ConnectReturnCode::NotAuthorized),
            _ => Err(ProtocolError::InvalidConnectReturnCode { return_code: value }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAckPacket {
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

impl ConnAckPacket {
    pub const fn accepted() -> Self {
        Self::refused(ConnectReturnCode::Accepted)
    }

    pub const fn refused(return_code: ConnectReturnCode) -> Self {
        Self {
            session_present: false,
            return_code,
        }
    }
}

impl PacketTypeConst for ConnAckPacket {
    const PACKET_TYPE: PacketType = PacketType::ConnAck;
}

impl PacketFlagsConst for ConnAckPacket {
    const PACKET_FLAGS: u8 = 0b0000;
}

impl PacketEncoder for ConnAckPacket {
    fn encode_body(&self, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
        buffer.put_u8(u8::from(self.session_present));
        buffer.put_u8(self.return_code as u8);
        Ok(())
    }

    fn decode_body(bytes: &[u8], _header: u8) -> Result<Self, ProtocolError> {
        let mut offset = 0;
        let flag = read_u8(bytes, &mut offset)?;
        if flag > 1 {
            return Err(ProtocolError::InvalidSessionPresentFlag { flag });
        }
        let return_code = ConnectReturnCode::try_from(read_u8(bytes, &mut offset)?)?;
        expect_consumed(bytes, offset)?;
        Ok(Self {
            session_present: flag == 1,
            return_code,
        })
    }
}
