//! The bounded, self-framing packet.

use std::cell::Cell;
use std::fmt;
use std::ops::Range;

use serial::{ByteRead, ByteWrite, Underrun, WriteError, WriteResult};
use tracing::{debug, error, trace, warn};

use crate::connection::ConnectionId;
use crate::error::{FramingError, PacketError, PacketResult, ProtocolViolation};
use crate::header::{read_size_field, PacketSize, PacketType, HEADER_SIZE, SIZE_FIELD_LEN};
use crate::limits::clamp_packet_limit;

/// Where a packet is in its lifecycle.
///
/// Outbound packets go `Write -> Send`; inbound packets go `Receive -> Read`.
/// [`Packet::reset`] returns any packet to `Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketMode {
    /// Fields are being encoded.
    Write,
    /// Finalized; bytes are being handed to the transport.
    Send,
    /// Bytes are being accumulated from the transport.
    Receive,
    /// Fully received; fields are being decoded.
    Read,
}

impl fmt::Display for PacketMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Write => "write",
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Read => "read",
        };
        write!(f, "{name}")
    }
}

/// A bounded, typed, self-framing byte container.
///
/// Wire layout: `[size: u16 LE][type: u8][fields...]`, where `size` counts
/// the whole packet. The buffer never grows past the packet's limit, and the
/// cursor never moves past the end of the buffer.
///
/// A packet is driven by one connection at a time. Decoding a peer-supplied
/// packet past its end records a [`ProtocolViolation`] instead of failing;
/// check [`violation`](Self::violation) (or hand the packet to a
/// [`ConnectionRegistry`](crate::ConnectionRegistry)) after decoding.
#[derive(Debug, Clone)]
pub struct Packet {
    mode: PacketMode,
    pos: usize,
    buffer: Vec<u8>,
    limit: usize,
    declared: Option<usize>,
    connection: Option<ConnectionId>,
    violation: Cell<Option<ProtocolViolation>>,
}

impl Packet {
    /// Starts an outbound packet of the given type.
    ///
    /// `limit` is clamped to `HEADER_SIZE..=MAX_PACKET_SIZE`.
    #[must_use]
    pub fn outbound(packet_type: PacketType, limit: usize) -> Self {
        let mut packet = Self {
            mode: PacketMode::Write,
            pos: 0,
            buffer: Vec::new(),
            limit: clamp_packet_limit(limit),
            declared: None,
            connection: None,
            violation: Cell::new(None),
        };
        packet.reset(packet_type);
        packet
    }

    /// Starts an inbound packet for `connection`.
    ///
    /// The buffer is sized to receive `initial_read_size` bytes (clamped to
    /// `SIZE_FIELD_LEN..=limit`) before the declared size is known. Streams
    /// use [`SIZE_FIELD_LEN`]; datagrams use the whole limit.
    #[must_use]
    pub fn inbound(connection: ConnectionId, limit: usize, initial_read_size: usize) -> Self {
        let limit = clamp_packet_limit(limit);
        let initial = initial_read_size.clamp(SIZE_FIELD_LEN, limit);
        Self {
            mode: PacketMode::Receive,
            pos: 0,
            buffer: vec![0; initial],
            limit,
            declared: None,
            connection: Some(connection),
            violation: Cell::new(None),
        }
    }

    /// Builds a packet in read mode from one complete frame already in memory.
    ///
    /// The frame goes through the same size validation as bytes arriving from
    /// a transport.
    pub fn received(connection: ConnectionId, limit: usize, frame: &[u8]) -> PacketResult<Self> {
        let mut packet = Self::inbound(connection, limit, SIZE_FIELD_LEN);
        let Some(size_field) = frame.get(..SIZE_FIELD_LEN) else {
            let err = FramingError::Truncated {
                received: frame.len(),
            };
            packet.flag_framing(err);
            return Err(err.into());
        };
        packet.buffer.copy_from_slice(size_field);
        packet.pos = SIZE_FIELD_LEN;

        let size = packet.parse_packet_size()?;
        if frame.len() != size {
            let err = FramingError::SizeMismatch {
                declared: size,
                received: frame.len(),
            };
            packet.flag_framing(err);
            return Err(err.into());
        }
        packet.buffer.copy_from_slice(frame);
        packet.pos = size;
        packet.prepare_to_read()?;
        Ok(packet)
    }

    /// Reinitializes this allocation as a new outbound packet.
    ///
    /// Clears the cursor, buffer, declared size and any recorded violation,
    /// then reserves the header.
    pub fn reset(&mut self, packet_type: PacketType) {
        self.buffer.clear();
        self.buffer.extend_from_slice(&[0; SIZE_FIELD_LEN]);
        self.buffer.push(packet_type);
        self.pos = 0;
        self.mode = PacketMode::Write;
        self.declared = None;
        self.violation.set(None);
    }

    /// Finalizes an outbound packet for transfer.
    ///
    /// Back-patches the size field and rewinds the cursor to the start so the
    /// transfer adapters send the whole buffer. Returns the packet size.
    pub fn prepare_to_send(&mut self) -> PacketResult<usize> {
        self.expect_mode(PacketMode::Write)?;
        let size = self.buffer.len();
        let size_field = PacketSize::try_from(size).map_err(|_| WriteError::Overflow {
            needed: size,
            limit: self.limit,
        })?;
        self.buffer[..SIZE_FIELD_LEN].copy_from_slice(&size_field.to_le_bytes());
        self.pos = 0;
        self.mode = PacketMode::Send;
        self.buffer.shrink_to_fit();
        trace!(size, packet_type = self.packet_type(), "packet ready to send");
        Ok(size)
    }

    /// Overwrites two already-written payload bytes with a `u16` (little-endian).
    ///
    /// Used for counts that are only known after the fields they describe.
    pub fn write_u16_at(&mut self, offset: usize, value: u16) -> PacketResult<()> {
        self.expect_mode(PacketMode::Write)?;
        let size = self.buffer.len();
        let in_bounds = offset >= HEADER_SIZE && offset.checked_add(2).is_some_and(|end| end <= size);
        if !in_bounds {
            return Err(PacketError::OffsetOutOfBounds { offset, size });
        }
        self.buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Returns `true` once enough bytes arrived to read the size field.
    #[must_use]
    pub const fn has_packet_size_data(&self) -> bool {
        self.pos >= SIZE_FIELD_LEN
    }

    /// The size the first field declares, without validating or changing anything.
    ///
    /// Returns `0` if the buffer is shorter than the size field.
    #[must_use]
    pub fn read_raw_packet_size(&self) -> usize {
        read_size_field(&self.buffer).map_or(0, usize::from)
    }

    /// Validates the declared size and resizes the buffer to receive exactly it.
    ///
    /// A declared size below [`HEADER_SIZE`] or above the limit is a framing
    /// violation: it is recorded on the packet and returned as an error.
    pub fn parse_packet_size(&mut self) -> PacketResult<usize> {
        self.expect_mode(PacketMode::Receive)?;
        if !self.has_packet_size_data() {
            return Err(PacketError::Incomplete {
                remaining: SIZE_FIELD_LEN - self.pos,
            });
        }

        let declared = self.read_raw_packet_size();
        if declared < HEADER_SIZE {
            let err = FramingError::TooSmall {
                declared,
                minimum: HEADER_SIZE,
            };
            self.flag_framing(err);
            return Err(err.into());
        }
        if declared > self.limit {
            let err = FramingError::TooLarge {
                declared,
                limit: self.limit,
            };
            self.flag_framing(err);
            return Err(err.into());
        }

        self.buffer.resize(declared, 0);
        self.pos = self.pos.min(declared);
        self.declared = Some(declared);
        Ok(declared)
    }

    /// Checks that a datagram carried exactly the bytes its header declares.
    pub fn verify_datagram(&self, received: usize) -> Result<(), FramingError> {
        let declared = self
            .declared
            .unwrap_or_else(|| self.read_raw_packet_size());
        if declared == received {
            return Ok(());
        }
        let err = FramingError::SizeMismatch { declared, received };
        self.flag_framing(err);
        Err(err)
    }

    /// The size accepted by [`parse_packet_size`](Self::parse_packet_size), if it ran.
    #[must_use]
    pub const fn declared_size(&self) -> Option<usize> {
        self.declared
    }

    /// Returns `true` once the declared size has been parsed and fully received.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.mode == PacketMode::Receive
            && self.declared.is_some()
            && self.remaining_bytes_to_transfer() == 0
    }

    /// Switches a fully received packet to read mode.
    ///
    /// The cursor is placed on the first field after the header. Returns the
    /// packet type.
    pub fn prepare_to_read(&mut self) -> PacketResult<PacketType> {
        self.expect_mode(PacketMode::Receive)?;
        if self.declared.is_none() {
            return Err(PacketError::Incomplete {
                remaining: SIZE_FIELD_LEN.saturating_sub(self.pos),
            });
        }
        let remaining = self.remaining_bytes_to_transfer();
        if remaining > 0 {
            return Err(PacketError::Incomplete { remaining });
        }
        self.pos = HEADER_SIZE;
        self.mode = PacketMode::Read;
        Ok(self.packet_type())
    }

    /// The message type tag (`0` if the header has not arrived).
    #[must_use]
    pub fn packet_type(&self) -> PacketType {
        self.buffer.get(SIZE_FIELD_LEN).copied().unwrap_or(0)
    }

    /// Reads a `u16` length prefix and returns the range of the nested payload
    /// that follows, advancing past it.
    ///
    /// Returns `None` (and records an underrun) if the prefix or payload is
    /// truncated. Pair with [`SubPacketReader`](crate::SubPacketReader) to
    /// decode the payload in place.
    pub fn read_nested(&mut self) -> Option<Range<usize>> {
        let len = usize::from(u16::from_le_bytes(self.read_array()?));
        let start = self.pos;
        self.skip(len).then_some(start..start + len)
    }

    /// Bytes between the cursor and the end of the buffer.
    #[must_use]
    pub fn remaining_bytes_to_transfer(&self) -> usize {
        self.buffer.len().saturating_sub(self.pos)
    }

    /// Current buffer length.
    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Maximum packet size in bytes.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    #[must_use]
    pub const fn mode(&self) -> PacketMode {
        self.mode
    }

    /// The connection this packet belongs to (inbound packets only).
    #[must_use]
    pub const fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// The first protocol violation recorded while receiving or decoding.
    #[must_use]
    pub fn violation(&self) -> Option<ProtocolViolation> {
        self.violation.get()
    }

    /// Returns `true` if the connection should be closed.
    #[must_use]
    pub fn close_requested(&self) -> bool {
        self.violation.get().is_some()
    }

    /// The whole buffer, header included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Reserves capacity for at least `additional` more bytes.
    pub fn reserve(&mut self, additional: usize) {
        self.buffer
            .reserve(additional.min(self.limit.saturating_sub(self.buffer.len())));
    }

    pub(crate) fn expect_mode(&self, expected: PacketMode) -> PacketResult<()> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(PacketError::WrongMode {
                expected,
                actual: self.mode,
            })
        }
    }

    pub(crate) fn buffer_from_cursor(&self, amount: usize) -> &[u8] {
        &self.buffer[self.pos..self.pos + amount]
    }

    pub(crate) fn buffer_from_cursor_mut(&mut self, amount: usize) -> &mut [u8] {
        &mut self.buffer[self.pos..self.pos + amount]
    }

    pub(crate) fn advance_cursor(&mut self, amount: usize) {
        self.pos = (self.pos + amount).min(self.buffer.len());
    }

    /// Records a violation; the first one is kept.
    pub(crate) fn flag_violation(&self, violation: ProtocolViolation) {
        if self.violation.get().is_none() {
            self.violation.set(Some(violation));
        }
    }

    pub(crate) fn flag_framing(&self, err: FramingError) {
        warn!(
            connection = ?self.connection,
            %err,
            "rejecting packet size"
        );
        self.flag_violation(ProtocolViolation::Framing(err));
    }
}

impl ByteWrite for Packet {
    fn buffer_mut(&mut self) -> WriteResult<&mut Vec<u8>> {
        if self.mode != PacketMode::Write {
            return Err(WriteError::NotWritable);
        }
        Ok(&mut self.buffer)
    }

    fn written(&self) -> usize {
        self.buffer.len()
    }

    fn write_limit(&self) -> usize {
        self.limit
    }

    fn reserve_write(&mut self, bytes: usize) -> WriteResult<&mut Vec<u8>> {
        if self.mode != PacketMode::Write {
            return Err(WriteError::NotWritable);
        }
        let needed = self.buffer.len().saturating_add(bytes);
        if needed > self.limit {
            error!(
                needed,
                limit = self.limit,
                packet_type = self.packet_type(),
                "packet write exceeds limit"
            );
            return Err(WriteError::Overflow {
                needed,
                limit: self.limit,
            });
        }
        Ok(&mut self.buffer)
    }
}

impl ByteRead for Packet {
    /// Empty unless the packet is in [`PacketMode::Read`].
    fn read_data(&self) -> &[u8] {
        match self.mode {
            PacketMode::Read => &self.buffer,
            _ => &[],
        }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn set_position(&mut self, position: usize) {
        self.pos = position.min(self.buffer.len());
    }

    fn signal_underrun(&mut self, underrun: Underrun) {
        debug!(
            connection = ?self.connection,
            packet_type = self.packet_type(),
            %underrun,
            "read past end of packet"
        );
        self.flag_violation(ProtocolViolation::Underrun(underrun));
    }

    /// Reads are only possible in [`PacketMode::Read`]; in any other mode
    /// this returns `false` without recording an underrun.
    fn can_read(&mut self, bytes: usize, close_connection: bool) -> bool {
        if self.mode != PacketMode::Read {
            return false;
        }
        let available = self.remaining();
        if bytes <= available {
            return true;
        }
        if close_connection {
            let position = self.pos;
            self.signal_underrun(Underrun {
                requested: bytes,
                available,
                position,
            });
        }
        false
    }
}
