//! Per-connection receive buffer.
//!
//! TCP delivers a byte stream, so one read may hold half a frame or
//! several frames back to back. `ConnectionBuffer` accumulates bytes
//! until a full frame is present and then hands it out in order.

use crate::binary_codec::{decode_client, ProtocolError};
use crate::packets::ClientPacket;
use crate::wire_types::{Opcode, RX_BUFFER_CAPACITY};

/// Fixed-capacity byte accumulator for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl Default for ConnectionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionBuffer {
    pub fn new() -> Self {
        Self::with_capacity(RX_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append received bytes.
    ///
    /// Fails without modifying the buffer if the bytes would not fit.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if bytes.len() > self.free_space() {
            return Err(ProtocolError::BufferOverflow {
                len: self.data.len() + bytes.len(),
                capacity: self.capacity,
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// First buffered byte, if any.
    pub fn peek_opcode(&self) -> Option<u8> {
        self.data.first().copied()
    }

    pub fn has_complete(&self, size: usize) -> bool {
        self.data.len() >= size
    }

    /// Drop the first `size` bytes (clamped to what is buffered) and shift
    /// the rest to the front.
    pub fn consume(&mut self, size: usize) {
        let n = size.min(self.data.len());
        self.data.drain(..n);
    }

    pub fn free_space(&self) -> usize {
        self.capacity - self.data.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Take the next complete client frame off the front of the buffer.
    ///
    /// - `Ok(None)`: empty, or the frame at the front is still partial.
    /// - `Ok(Some(_))`: one frame decoded and consumed.
    /// - `Err(_)`: the front byte is not a client opcode. Nothing is
    ///   consumed; the connection is unusable from here on.
    pub fn next_client_packet(&mut self) -> Result<Option<ClientPacket>, ProtocolError> {
        let Some(raw) = self.peek_opcode() else {
            return Ok(None);
        };
        let opcode = Opcode::from_u8(raw).ok_or(ProtocolError::UnknownOpcode(raw))?;
        let size = opcode
            .client_frame_len()
            .ok_or(ProtocolError::UnexpectedOpcode(opcode))?;
        if !self.has_complete(size) {
            return Ok(None);
        }
        let packet = decode_client(&self.data[..size])?;
        self.consume(size);
        Ok(Some(packet))
    }
}
