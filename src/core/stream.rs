use super::error::{PDFError, PDFResult};
use std::sync::Arc;

/// In-memory byte cursor over a document's raw bytes.
///
/// The underlying data is stored in an `Arc`, so sub-streams positioned at an
/// object's offset share the file buffer instead of copying it.
#[derive(Debug, Clone)]
pub struct Stream {
    /// The underlying byte buffer (shared via Arc)
    bytes: Arc<[u8]>,
    /// Current read position (absolute)
    pos: usize,
    /// First readable offset
    start: usize,
    /// One past the last readable offset
    end: usize,
}

impl Stream {
    /// Creates a new Stream over the whole byte vector.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let end = bytes.len();
        Stream {
            bytes: Arc::from(bytes),
            pos: 0,
            start: 0,
            end,
        }
    }

    /// Creates a stream that shares `self`'s buffer, starting at `start`
    /// and running to the end of the buffer.
    pub fn sub_stream(&self, start: usize) -> PDFResult<Stream> {
        if start > self.bytes.len() {
            return Err(PDFError::InvalidPosition {
                pos: start,
                length: self.bytes.len(),
            });
        }
        Ok(Stream {
            bytes: Arc::clone(&self.bytes),
            pos: start,
            start,
            end: self.bytes.len(),
        })
    }

    /// Total readable length.
    pub fn length(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Current absolute position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves to an absolute position.
    pub fn set_pos(&mut self, pos: usize) -> PDFResult<()> {
        if pos < self.start || pos > self.end {
            return Err(PDFError::InvalidPosition {
                pos,
                length: self.end,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Returns the byte at the current position without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        (self.pos < self.end).then(|| self.bytes[self.pos])
    }

    /// Reads one byte; `None` at end of stream.
    pub fn get_byte(&mut self) -> Option<u8> {
        let byte = self.peek_byte()?;
        self.pos += 1;
        Some(byte)
    }

    /// Reads exactly `length` bytes.
    pub fn get_bytes(&mut self, length: usize) -> PDFResult<Vec<u8>> {
        let end = self
            .pos
            .checked_add(length)
            .filter(|end| *end <= self.end)
            .ok_or(PDFError::UnexpectedEndOfStream)?;
        let bytes = self.bytes[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }

    /// The full underlying buffer, independent of the current window.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Finds the next occurrence of `needle` at or after the current position.
    pub fn find_forward(&self, needle: &[u8]) -> Option<usize> {
        self.bytes[self.pos..self.end]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|offset| self.pos + offset)
    }
}
