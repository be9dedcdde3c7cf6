//! Per-connection engine configuration.

use crate::protocol::packets::{MQTT_3_1_1_PROTOCOL_LEVEL, MQTT_3_1_PROTOCOL_LEVEL};
use crate::protocol::utils::MAX_FRAME_LENGTH;

/// Default cap on a whole frame (1MB).
pub const DEFAULT_MAX_PACKET_BYTES: usize = 1024 * 1024;

/// Default multiplier applied to the client's keep-alive.
pub const DEFAULT_KEEP_ALIVE_GRACE_FACTOR: f32 = 1.5;

/// Largest accepted keep-alive multiplier.
pub const MAX_KEEP_ALIVE_GRACE_FACTOR: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Protocol levels admitted at CONNECT (3 = MQTT 3.1, 4 = MQTT 3.1.1).
    pub protocol_versions: Vec<u8>,

    /// Admit a CONNECT that carries no username.
    pub allow_anonymous: bool,

    /// Largest frame, header included, the tokenizer will buffer.
    pub max_packet_bytes: usize,

    /// The connection is dropped after `keep_alive * keep_alive_grace_factor`
    /// seconds without traffic.
    pub keep_alive_grace_factor: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protocol_versions: vec![MQTT_3_1_PROTOCOL_LEVEL, MQTT_3_1_1_PROTOCOL_LEVEL],
            allow_anonymous: true,
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
            keep_alive_grace_factor: DEFAULT_KEEP_ALIVE_GRACE_FACTOR,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol_versions.is_empty() {
            return Err(ConfigError::NoProtocolVersions);
        }
        if let Some(&level) = self
            .protocol_versions
            .iter()
            .find(|&&level| level != MQTT_3_1_PROTOCOL_LEVEL && level != MQTT_3_1_1_PROTOCOL_LEVEL)
        {
            return Err(ConfigError::UnsupportedProtocolVersion { level });
        }
        if self.max_packet_bytes == 0 || self.max_packet_bytes > MAX_FRAME_LENGTH {
            return Err(ConfigError::InvalidMaxPacketBytes {
                value: self.max_packet_bytes,
            });
        }
        if !(1.0..=MAX_KEEP_ALIVE_GRACE_FACTOR).contains(&self.keep_alive_grace_factor) {
            return Err(ConfigError::InvalidGraceFactor {
                value: self.keep_alive_grace_factor,
            });
        }
        Ok(())
    }

    pub fn accepts_protocol_level(&self, level: u8) -> bool {
        self.protocol_versions.contains(&level)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No protocol level is accepted
    NoProtocolVersions,
    /// Only levels 3 and 4 are implemented
    UnsupportedProtocolVersion { level: u8 },
    /// Packet cap is zero or larger than the wire format allows
    InvalidMaxPacketBytes { value: usize },
    /// Grace factor must lie in `1.0..=MAX_KEEP_ALIVE_GRACE_FACTOR`
    InvalidGraceFactor { value: f32 },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::NoProtocolVersions => write!(f, "protocol_versions must not be empty"),
            ConfigError::UnsupportedProtocolVersion { level } => {
                write!(f, "Unsupported protocol level: {}", level)
            }
            ConfigError::InvalidMaxPacketBytes { value } => write!(
                f,
                "max_packet_bytes must be between 1 and {}, got {}",
                MAX_FRAME_LENGTH, value
            ),
            ConfigError::InvalidGraceFactor { value } => {
                write!(
                    f,
                    "keep_alive_grace_factor must be between 1.0 and {}, got {}",
                    MAX_KEEP_ALIVE_GRACE_FACTOR, value
                )
            }
        }
    }
}

impl core::error::Error for ConfigError {}
