use crate::protocol::ProtocolError;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum QoS {
    /// At most once (fire and forget)
    #[default]
    AtMostOnce = 0,
    /// At least once (acknowledged delivery)
    AtLeastOnce = 1,
    /// Exactly once (assured delivery)
    ExactlyOnce = 2,
}

impl QoS {
    /// Level 3 is reserved and rejected.
    pub const fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(ProtocolError::InvalidQosLevel { level: value }),
        }
    }
}
