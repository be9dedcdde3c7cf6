use crate::protocol::utils::read_variable_length;
use crate::protocol::FrameError;

/// The fixed header every MQTT control packet starts with.
///
/// ```text
///   byte 1:     packet type (high nibble) + flags (low nibble)
///   bytes 2-5:  remaining length, 7 bits per byte, bit 7 = "more follows"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub first_byte: u8,
    pub remaining_length: usize,
    /// Length of the header itself: 1 + bytes used by the remaining length
    pub header_length: usize,
}

impl FixedHeader {
    /// Parse the header at the start of `bytes`.
    ///
    /// Returns `Ok(None)` until enough bytes are present to know the full
    /// header. Only the length encoding is validated here.
    pub fn parse(bytes: &[u8]) -> Result<Option<Self>, FrameError> {
        let Some(&first_byte) = bytes.first() else {
            return Ok(None);
        };
        Ok(read_variable_length(&bytes[1..])?.map(|(remaining_length, len_bytes)| Self {
            first_byte,
            remaining_length,
            header_length: 1 + len_bytes,
        }))
    }

    /// Size of the whole frame on the wire.
    pub const fn frame_length(&self) -> usize {
        self.header_length + self.remaining_length
    }

    pub const fn flags(&self) -> u8 {
        self.first_byte & 0x0F
    }

    pub const fn dup(&self) -> bool {
        self.first_byte & 0b1000 != 0
    }

    /// Raw two-bit QoS field, which may hold the reserved value 3.
    pub const fn qos_bits(&self) -> u8 {
        (self.first_byte >> 1) & 0b11
    }

    pub const fn retain(&self) -> bool {
        self.first_byte & 0b0001 != 0
    }
}
