/// Failure while decoding or encoding a single MQTT control packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// A field runs past the end of the packet body
    IncompletePacket,
    /// Body length does not match what the packet type requires
    InvalidPacketLength { expected: usize, actual: usize },
    /// Invalid or reserved packet type
    InvalidPacketType { packet_type: u8 },
    /// Reserved fixed header flag bits are set incorrectly
    InvalidFixedHeaderFlags { expected: u8, actual: u8 },
    /// Invalid variable length integer encoding
    InvalidLengthEncoding,
    /// Invalid UTF-8 string, or a string containing U+0000
    InvalidUtf8String,
    /// Invalid QoS level
    InvalidQosLevel { level: u8 },
    /// Packet identifier missing or zero where one is required
    MissingPacketId,
    /// Packet identifier supplied for a QoS 0 PUBLISH
    UnexpectedPacketId,
    /// Invalid protocol name in CONNECT
    InvalidProtocolName,
    /// Invalid connect flags in CONNECT
    InvalidConnectFlags { flags: u8 },
    /// Invalid connect return code in CONNACK
    InvalidConnectReturnCode { return_code: u8 },
    /// Invalid acknowledge flags in CONNACK
    InvalidSessionPresentFlag { flag: u8 },
    /// Invalid return code in SUBACK
    InvalidSubAckReturnCode { return_code: u8 },
    /// Topic name or filter is empty
    TopicEmpty,
    /// Topic name contains a wildcard character
    InvalidTopicName,
    /// Topic filter uses a wildcard in an illegal position
    InvalidTopicFilter,
    /// SUBSCRIBE or UNSUBSCRIBE without any topic filter
    NoTopicFilters,
    /// String or binary field longer than a two-byte length prefix allows
    FieldTooLong { length: usize },
    /// Remaining length exceeds what the fixed header can express
    PacketTooLarge { max_size: usize, actual_size: usize },
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::IncompletePacket => write!(f, "Incomplete packet (not enough data)"),
            ProtocolError::InvalidPacketLength { expected, actual } => {
                write!(
                    f,
                    "Invalid packet length: expected {}, got {}",
                    expected, actual
                )
            }
            ProtocolError::InvalidPacketType { packet_type } => {
                write!(f, "Invalid packet type: {}", packet_type)
            }
            ProtocolError::InvalidFixedHeaderFlags { expected, actual } => {
                write!(
                    f,
                    "Invalid fixed header flags: expected {:04b}, actual {:04b}",
                    expected, actual
                )
            }
            ProtocolError::InvalidLengthEncoding => {
                write!(f, "Invalid variable length integer encoding")
            }
            ProtocolError::InvalidUtf8String => write!(f, "Invalid UTF-8 string"),
            ProtocolError::InvalidQosLevel { level } => write!(f, "Invalid QoS level: {}", level),
            ProtocolError::MissingPacketId => {
                write!(f, "Missing Packet Identifier where one is required")
            }
            ProtocolError::UnexpectedPacketId => {
                write!(f, "Packet Identifier is not allowed on a QoS 0 PUBLISH")
            }
            ProtocolError::InvalidProtocolName => {
                write!(f, "Invalid protocol name in CONNECT packet")
            }
            ProtocolError::InvalidConnectFlags { flags } => {
                write!(f, "Invalid connect flags in CONNECT packet: {:08b}", flags)
            }
            ProtocolError::InvalidConnectReturnCode { return_code } => {
                write!(f, "Invalid connect return code in CONNACK: {}", return_code)
            }
            ProtocolError::InvalidSessionPresentFlag { flag } => {
                write!(
                    f,
                    "Invalid session present flag in CONNACK packet: {}",
                    flag
                )
            }
            ProtocolError::InvalidSubAckReturnCode { return_code } => {
                write!(f, "Invalid return code in SUBACK: {:#04x}", return_code)
            }
            ProtocolError::TopicEmpty => write!(f, "Topic name is empty"),
            ProtocolError::InvalidTopicName => {
                write!(f, "Topic name must not contain wildcard characters")
            }
            ProtocolError::InvalidTopicFilter => write!(f, "Malformed topic filter"),
            ProtocolError::NoTopicFilters => write!(f, "Packet carries no topic filters"),
            ProtocolError::FieldTooLong { length } => {
                write!(f, "Field too long for length prefix: {} bytes", length)
            }
            ProtocolError::PacketTooLarge {
                max_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Packet too large: size {}, max {}",
                    actual_size, max_size
                )
            }
        }
    }
}

impl core::error::Error for ProtocolError {}

/// Failure while reassembling frames from the raw byte stream.
///
/// Either of these leaves the stream position unknown, so the connection
/// cannot continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Remaining length continues past its fourth byte
    InvalidLengthEncoding,
    /// Announced frame size exceeds the configured cap
    FrameTooLarge { max_size: usize, actual_size: usize },
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::InvalidLengthEncoding => {
                write!(f, "Invalid remaining length encoding")
            }
            FrameError::FrameTooLarge {
                max_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Frame too large: size {}, max {}",
                    actual_size, max_size
                )
            }
        }
    }
}

impl core::error::Error for FrameError {}

impl From<FrameError> for ProtocolError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::InvalidLengthEncoding => ProtocolError::InvalidLengthEncoding,
            FrameError::FrameTooLarge {
                max_size,
                actual_size,
            } => ProtocolError::PacketTooLarge {
                max_size,
                actual_size,
            },
        }
    }
}
