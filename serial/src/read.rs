//! Bounded byte reader capability, the tolerant adapter and a slice reader.

use crate::error::Underrun;

/// A byte source with a cursor that never reads past its data.
///
/// The provided methods decode every supported field type. A read that needs
/// more bytes than remain resolves to `0`, `false`, an empty string or an
/// empty buffer, and never moves the cursor past the end. If
/// [`close_on_underrun`](Self::close_on_underrun) is `true` the shortfall is
/// also reported through [`signal_underrun`](Self::signal_underrun).
pub trait ByteRead {
    /// All readable bytes, starting at offset zero.
    fn read_data(&self) -> &[u8];

    /// Current cursor position.
    fn position(&self) -> usize;

    /// Moves the cursor. Callers only move it within `read_data().len()`.
    fn set_position(&mut self, position: usize);

    /// Records that an underrun should close the connection.
    fn signal_underrun(&mut self, underrun: Underrun);

    /// Whether primitive reads ask for the connection to be closed on underrun.
    fn close_on_underrun(&self) -> bool {
        true
    }

    /// Bytes between the cursor and the end of the data.
    fn remaining(&self) -> usize {
        self.read_data().len().saturating_sub(self.position())
    }

    /// Returns `true` if `bytes` more bytes can be read.
    ///
    /// When they cannot and `close_connection` is set, the shortfall is
    /// reported through [`signal_underrun`](Self::signal_underrun).
    fn can_read(&mut self, bytes: usize, close_connection: bool) -> bool {
        let available = self.remaining();
        if bytes <= available {
            return true;
        }
        if close_connection {
            let position = self.position();
            self.signal_underrun(Underrun {
                requested: bytes,
                available,
                position,
            });
        }
        false
    }

    /// Returns a reader over the same cursor that tolerates underruns silently.
    ///
    /// Meant for optional trailing fields.
    fn tolerant(&mut self) -> Tolerant<'_, Self> {
        Tolerant { inner: self }
    }

    /// Reads exactly `N` bytes, or `None` if fewer remain.
    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let close = self.close_on_underrun();
        if !self.can_read(N, close) {
            return None;
        }
        let position = self.position();
        let bytes = self.read_data().get(position..position + N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.set_position(position + N);
        Some(out)
    }

    /// Reads a one-byte boolean; any non-zero value is `true`.
    fn read_bool(&mut self) -> bool {
        self.read_u8() != 0
    }

    fn read_u8(&mut self) -> u8 {
        self.read_array().map_or(0, u8::from_le_bytes)
    }

    /// Reads a `u16` (little-endian).
    fn read_u16(&mut self) -> u16 {
        self.read_array().map_or(0, u16::from_le_bytes)
    }

    /// Reads a `u32` (little-endian).
    fn read_u32(&mut self) -> u32 {
        self.read_array().map_or(0, u32::from_le_bytes)
    }

    /// Reads a `u64` (little-endian).
    fn read_u64(&mut self) -> u64 {
        self.read_array().map_or(0, u64::from_le_bytes)
    }

    fn read_i8(&mut self) -> i8 {
        self.read_array().map_or(0, i8::from_le_bytes)
    }

    fn read_i16(&mut self) -> i16 {
        self.read_array().map_or(0, i16::from_le_bytes)
    }

    fn read_i32(&mut self) -> i32 {
        self.read_array().map_or(0, i32::from_le_bytes)
    }

    fn read_i64(&mut self) -> i64 {
        self.read_array().map_or(0, i64::from_le_bytes)
    }

    /// Reads a zero-terminated string.
    ///
    /// Stops at the terminator or at the end of the data. A missing
    /// terminator yields the partial text and counts as an underrun.
    /// Invalid UTF-8 is replaced with U+FFFD.
    fn read_string(&mut self) -> String {
        self.read_string_bounded(usize::MAX)
    }

    /// Reads a zero-terminated string, keeping at most `max_len` bytes.
    ///
    /// Bytes past `max_len` are skipped up to and including the terminator.
    fn read_string_bounded(&mut self, max_len: usize) -> String {
        let close = self.close_on_underrun();
        let position = self.position();
        let rest = self.read_data().get(position..).unwrap_or_default();
        let terminator = rest.iter().position(|&b| b == 0);
        let end = terminator.unwrap_or(rest.len());

        let mut text = String::from_utf8_lossy(&rest[..end]).into_owned();
        if text.len() > max_len {
            let mut cut = max_len;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }

        match terminator {
            Some(_) => self.set_position(position + end + 1),
            None => {
                // Records the missing terminator before consuming the tail.
                let _ = self.can_read(end + 1, close);
                self.set_position(position + end);
            }
        }
        text
    }

    /// Copies up to `out.len()` bytes and returns how many were copied.
    ///
    /// A short copy is not treated as an underrun.
    fn read_bytes(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.remaining());
        if count == 0 {
            return 0;
        }
        let position = self.position();
        match self.read_data().get(position..position + count) {
            Some(bytes) => out[..count].copy_from_slice(bytes),
            None => return 0,
        }
        self.set_position(position + count);
        count
    }

    /// Borrows the next `len` bytes, or an empty slice on underrun.
    fn read_raw(&mut self, len: usize) -> &[u8] {
        let close = self.close_on_underrun();
        if !self.can_read(len, close) {
            return &[];
        }
        let position = self.position();
        self.set_position(position + len);
        self.read_data()
            .get(position..position + len)
            .unwrap_or_default()
    }

    /// Reads a `u16` length prefix followed by that many bytes.
    ///
    /// Returns an empty buffer if the body is truncated.
    fn read_buffer(&mut self) -> Vec<u8> {
        let len = usize::from(self.read_u16());
        self.read_raw(len).to_vec()
    }

    /// Advances the cursor by `len` bytes if they are available.
    fn skip(&mut self, len: usize) -> bool {
        let close = self.close_on_underrun();
        if !self.can_read(len, close) {
            return false;
        }
        let position = self.position();
        self.set_position(position + len);
        true
    }
}

/// A reader adapter that shares the inner cursor but never asks for the
/// connection to be closed on underrun.
#[derive(Debug)]
pub struct Tolerant<'r, R: ?Sized> {
    inner: &'r mut R,
}

impl<R: ByteRead + ?Sized> ByteRead for Tolerant<'_, R> {
    fn read_data(&self) -> &[u8] {
        self.inner.read_data()
    }

    fn position(&self) -> usize {
        self.inner.position()
    }

    fn set_position(&mut self, position: usize) {
        self.inner.set_position(position);
    }

    fn signal_underrun(&mut self, underrun: Underrun) {
        self.inner.signal_underrun(underrun);
    }

    fn close_on_underrun(&self) -> bool {
        false
    }

    fn can_read(&mut self, bytes: usize, close_connection: bool) -> bool {
        self.inner.can_read(bytes, close_connection)
    }
}

/// A standalone reader over a borrowed byte slice.
///
/// Keeps the first close-requesting underrun it sees.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
    underrun: Option<Underrun>,
}

impl<'a> SliceReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self::with_position(data, 0)
    }

    /// Creates a reader positioned at `pos`.
    #[must_use]
    pub const fn with_position(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            underrun: None,
        }
    }

    /// Returns the first recorded underrun, if any.
    #[must_use]
    pub const fn underrun(&self) -> Option<Underrun> {
        self.underrun
    }

    /// Returns `true` if an underrun asked for the connection to be closed.
    #[must_use]
    pub const fn close_requested(&self) -> bool {
        self.underrun.is_some()
    }
}

impl ByteRead for SliceReader<'_> {
    fn read_data(&self) -> &[u8] {
        self.data
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn set_position(&mut self, position: usize) {
        self.pos = position.min(self.data.len());
    }

    fn signal_underrun(&mut self, underrun: Underrun) {
        self.underrun.get_or_insert(underrun);
    }
}
