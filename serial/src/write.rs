//! Bounded byte writer capability and a standalone implementation.

use crate::error::{WriteError, WriteResult};

/// A byte sink with a hard size limit.
///
/// Implementors expose their growable buffer and limit; the provided methods
/// encode every supported field type little-endian and check the limit before
/// touching the buffer, so a failed write leaves earlier bytes intact.
pub trait ByteWrite {
    /// Returns the buffer to append to, or [`WriteError::NotWritable`].
    fn buffer_mut(&mut self) -> WriteResult<&mut Vec<u8>>;

    /// Number of bytes currently in the buffer.
    fn written(&self) -> usize;

    /// Maximum total buffer length in bytes.
    fn write_limit(&self) -> usize;

    /// Returns `true` if `bytes` more bytes fit under the limit.
    fn can_write(&self, bytes: usize) -> bool {
        self.written()
            .checked_add(bytes)
            .is_some_and(|needed| needed <= self.write_limit())
    }

    /// Checks the limit and hands out the buffer for a write of `bytes`.
    fn reserve_write(&mut self, bytes: usize) -> WriteResult<&mut Vec<u8>> {
        let limit = self.write_limit();
        let buf = self.buffer_mut()?;
        let needed = buf.len().saturating_add(bytes);
        if needed > limit {
            return Err(WriteError::Overflow { needed, limit });
        }
        Ok(buf)
    }

    /// Writes a boolean as a single byte (`1` or `0`).
    fn write_bool(&mut self, value: bool) -> WriteResult<()> {
        self.write_u8(u8::from(value))
    }

    fn write_u8(&mut self, value: u8) -> WriteResult<()> {
        self.reserve_write(1)?.push(value);
        Ok(())
    }

    /// Writes a `u16` (little-endian).
    fn write_u16(&mut self, value: u16) -> WriteResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a `u32` (little-endian).
    fn write_u32(&mut self, value: u32) -> WriteResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a `u64` (little-endian).
    fn write_u64(&mut self, value: u64) -> WriteResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_i8(&mut self, value: i8) -> WriteResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_i16(&mut self, value: i16) -> WriteResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_i32(&mut self, value: i32) -> WriteResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    fn write_i64(&mut self, value: i64) -> WriteResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes a string followed by a single zero terminator.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::EmbeddedNul`] if the string contains a zero byte.
    /// Returns [`WriteError::Overflow`] if the string and terminator do not fit.
    fn write_string(&mut self, value: &str) -> WriteResult<()> {
        if let Some(position) = value.bytes().position(|b| b == 0) {
            return Err(WriteError::EmbeddedNul { position });
        }
        let buf = self.reserve_write(value.len() + 1)?;
        buf.extend_from_slice(value.as_bytes());
        buf.push(0);
        Ok(())
    }

    /// Copies raw bytes verbatim.
    fn write_bytes(&mut self, bytes: &[u8]) -> WriteResult<()> {
        self.reserve_write(bytes.len())?.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a `u16` length prefix followed by the bytes.
    ///
    /// The prefix and body are written together or not at all.
    fn write_buffer(&mut self, bytes: &[u8]) -> WriteResult<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| WriteError::LengthOverflow { length: bytes.len() })?;
        let buf = self.reserve_write(2 + bytes.len())?;
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(bytes);
        Ok(())
    }
}

/// A standalone bounded writer backed by a `Vec<u8>`.
///
/// Useful for building a nested sub-message before embedding it in a packet
/// with [`ByteWrite::write_buffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedWriter {
    bytes: Vec<u8>,
    limit: usize,
}

impl BoundedWriter {
    /// Creates an empty writer that refuses to grow past `limit` bytes.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Finishes writing and returns the byte buffer.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

impl ByteWrite for BoundedWriter {
    fn buffer_mut(&mut self) -> WriteResult<&mut Vec<u8>> {
        Ok(&mut self.bytes)
    }

    fn written(&self) -> usize {
        self.bytes.len()
    }

    fn write_limit(&self) -> usize {
        self.limit
    }
}
