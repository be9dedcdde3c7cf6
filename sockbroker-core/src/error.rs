use crate::protocol::{FrameError, ProtocolError};

/// Everything that can go wrong while driving one client connection.
///
/// Each kind maps to a fixed policy: some tear the connection down, the rest
/// are logged and the connection keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The byte stream can no longer be split into frames
    CorruptedFrame(FrameError),
    /// One packet failed to decode; the stream is still in sync
    MalformedPacket(ProtocolError),
    /// The Session refused the CONNECT credentials
    AuthFailed {
        client_id: String,
        username: Option<String>,
    },
    /// An outbound packet could not be serialized and was dropped
    EncodeFailed(ProtocolError),
    /// A CONNECT arrived on a connection that already has a Session
    SessionAlreadyAllocated,
    /// A packet type the server does not accept from a client
    UnknownPacketType { packet_type: u8 },
    /// Frames queued while the auth verdict is pending exceeded the packet cap
    BacklogOverflow { bytes: usize },
}

impl ConnectionError {
    pub const fn closes_connection(&self) -> bool {
        matches!(
            self,
            ConnectionError::CorruptedFrame(_)
                | ConnectionError::AuthFailed { .. }
                | ConnectionError::BacklogOverflow { .. }
        )
    }
}

impl core::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConnectionError::CorruptedFrame(err) => write!(f, "Corrupted frame: {}", err),
            ConnectionError::MalformedPacket(err) => write!(f, "Malformed packet: {}", err),
            ConnectionError::AuthFailed {
                client_id,
                username,
            } => write!(
                f,
                "Authentication failed! clientID= {} username= {}",
                client_id,
                username.as_deref().unwrap_or("")
            ),
            ConnectionError::EncodeFailed(err) => write!(f, "Failed to encode packet: {}", err),
            ConnectionError::SessionAlreadyAllocated => write!(f, "Session already allocated"),
            ConnectionError::UnknownPacketType { packet_type } => {
                write!(f, "Unexpected packet type: {}", packet_type)
            }
            ConnectionError::BacklogOverflow { bytes } => {
                write!(f, "{} bytes queued before authentication completed", bytes)
            }
        }
    }
}

impl core::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            ConnectionError::CorruptedFrame(err) => Some(err),
            ConnectionError::MalformedPacket(err) | ConnectionError::EncodeFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FrameError> for ConnectionError {
    fn from(err: FrameError) -> Self {
        ConnectionError::CorruptedFrame(err)
    }
}
