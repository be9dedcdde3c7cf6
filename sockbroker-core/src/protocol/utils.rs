use bytes::{BufMut, BytesMut};

use crate::protocol::{FrameError, ProtocolError};

/// MQTT limits the remaining length to 268,435,455 (0x0FFFFFFF)
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Largest frame the fixed header can describe: type byte, four length bytes, body
pub const MAX_FRAME_LENGTH: usize = 1 + 4 + MAX_REMAINING_LENGTH;

pub const fn variable_length_length(value: usize) -> usize {
    if value < 128 {
        1
    } else if value < 16384 {
        2
    } else if value < 2097152 {
        3
    } else {
        4
    }
}

/// Decode a remaining length field.
///
/// Returns `Ok(None)` while the field is still incomplete, otherwise the value
/// and the number of bytes the field occupies.
pub fn read_variable_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, FrameError> {
    let mut multiplier = 1usize;
    let mut value = 0usize;

    for (index, &byte) in bytes.iter().enumerate() {
        if index == 4 {
            return Err(FrameError::InvalidLengthEncoding);
        }
        value += ((byte & 0x7F) as usize) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(Some((value, index + 1)));
        }
        multiplier *= 128;
    }

    if bytes.len() >= 4 {
        return Err(FrameError::InvalidLengthEncoding);
    }
    Ok(None)
}

pub fn write_variable_length(value: usize, buffer: &mut BytesMut) -> Result<usize, ProtocolError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(ProtocolError::PacketTooLarge {
            max_size: MAX_REMAINING_LENGTH,
            actual_size: value,
        });
    }

    let mut encoded = value;
    let mut bytes_written = 0;
    loop {
        let mut byte = (encoded & 0x7F) as u8;
        encoded >>= 7;
        if encoded > 0 {
            byte |= 0x80;
        }
        buffer.put_u8(byte);
        bytes_written += 1;
        if encoded == 0 {
            break;
        }
    }

    Ok(bytes_written)
}

pub fn read_u8(bytes: &[u8], offset: &mut usize) -> Result<u8, ProtocolError> {
    let byte = *bytes.get(*offset).ok_or(ProtocolError::IncompletePacket)?;
    *offset += 1;
    Ok(byte)
}

pub fn read_u16(bytes: &[u8], offset: &mut usize) -> Result<u16, ProtocolError> {
    if *offset + 2 > bytes.len() {
        return Err(ProtocolError::IncompletePacket);
    }
    let value = u16::from_be_bytes([bytes[*offset], bytes[*offset + 1]]);
    *offset += 2;
    Ok(value)
}

/// Read a packet identifier; MQTT 3.1.1 requires it to be non-zero.
pub fn read_packet_id(bytes: &[u8], offset: &mut usize) -> Result<u16, ProtocolError> {
    match read_u16(bytes, offset)? {
        0 => Err(ProtocolError::MissingPacketId),
        packet_id => Ok(packet_id),
    }
}

pub fn read_binary<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a [u8], ProtocolError> {
    let len = read_u16(bytes, offset)? as usize;
    if *offset + len > bytes.len() {
        return Err(ProtocolError::IncompletePacket);
    }
    let data = &bytes[*offset..*offset + len];
    *offset += len;
    Ok(data)
}

pub fn read_string<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a str, ProtocolError> {
    let data = read_binary(bytes, offset)?;
    let s = core::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8String)?;
    if s.contains('\0') {
        return Err(ProtocolError::InvalidUtf8String);
    }
    Ok(s)
}

pub fn write_binary(data: &[u8], buffer: &mut BytesMut) -> Result<(), ProtocolError> {
    let len = u16::try_from(data.len())
        .map_err(|_| ProtocolError::FieldTooLong { length: data.len() })?;
    buffer.put_u16(len);
    buffer.put_slice(data);
    Ok(())
}

pub fn write_string(s: &str, buffer: &mut BytesMut) -> Result<(), ProtocolError> {
    write_binary(s.as_bytes(), buffer)
}

/// Fail unless the whole body was consumed.
pub fn expect_consumed(bytes: &[u8], offset: usize) -> Result<(), ProtocolError> {
    if offset != bytes.len() {
        return Err(ProtocolError::InvalidPacketLength {
            expected: offset,
            actual: bytes.len(),
        });
    }
    Ok(())
}
