//! Frame reassembly
//!
//! Bytes arrive in arbitrary chunks. The tokenizer buffers them and cuts out
//! complete frames using the remaining length from the fixed header.

use bytes::{Bytes, BytesMut};
use log::trace;

use crate::protocol::{FixedHeader, FrameError};

#[derive(Debug)]
pub struct Tokenizer {
    buffer: BytesMut,
    max_packet_bytes: usize,
    poisoned: Option<FrameError>,
}

impl Tokenizer {
    pub fn new(max_packet_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_packet_bytes,
            poisoned: None,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Cut the next complete frame out of the buffer.
    ///
    /// Oversized frames are rejected as soon as their header is readable.
    /// Once an error is returned the tokenizer stays in that state.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        if let Some(err) = self.poisoned {
            return Err(err);
        }

        let header = match FixedHeader::parse(&self.buffer) {
            Ok(Some(header)) => header,
            Ok(None) => return Ok(None),
            Err(err) => return Err(self.poison(err)),
        };

        let frame_length = header.frame_length();
        if frame_length > self.max_packet_bytes {
            return Err(self.poison(FrameError::FrameTooLarge {
                max_size: self.max_packet_bytes,
                actual_size: frame_length,
            }));
        }
        if self.buffer.len() < frame_length {
            return Ok(None);
        }

        trace!("Tokenizer: frame of {} bytes", frame_length);
        Ok(Some(self.buffer.split_to(frame_length).freeze()))
    }

    /// Feed a chunk and hand every completed frame to `on_frame`, in order.
    pub fn process<F>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<(), FrameError>
    where
        F: FnMut(Bytes),
    {
        if let Some(err) = self.poisoned {
            return Err(err);
        }
        self.feed(chunk);
        while let Some(frame) = self.next_frame()? {
            on_frame(frame);
        }
        Ok(())
    }

    /// Remove the bytes of a frame that never completed.
    pub fn take_stalled(&mut self) -> Option<Bytes> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.split().freeze())
        }
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn poison(&mut self, err: FrameError) -> FrameError {
        self.poisoned = Some(err);
        self.buffer.clear();
        err
    }
}
