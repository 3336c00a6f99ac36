//! A reader over part of a packet's bytes that reports underruns to the packet.

use std::ops::Range;

use serial::{ByteRead, Underrun};
use tracing::debug;

use crate::connection::ConnectionId;
use crate::error::ProtocolViolation;
use crate::packet::Packet;

/// Decodes a borrowed byte range with the same primitives as [`Packet`].
///
/// Underruns are recorded on the parent packet, so a malformed nested
/// payload closes the same connection a malformed packet would.
#[derive(Debug, Clone)]
pub struct SubPacketReader<'a> {
    packet: &'a Packet,
    data: &'a [u8],
    pos: usize,
}

impl<'a> SubPacketReader<'a> {
    /// Reads `range` of the packet's own buffer, starting `pos` bytes into it.
    ///
    /// A range outside the buffer yields an empty reader.
    #[must_use]
    pub fn new(packet: &'a Packet, range: Range<usize>, pos: usize) -> Self {
        let data = packet.as_bytes().get(range).unwrap_or_default();
        Self::over(packet, data, pos)
    }

    /// Reads an arbitrary byte slice on behalf of `packet`.
    #[must_use]
    pub fn over(packet: &'a Packet, data: &'a [u8], pos: usize) -> Self {
        Self {
            packet,
            data,
            pos: pos.min(data.len()),
        }
    }

    #[must_use]
    pub const fn connection(&self) -> Option<ConnectionId> {
        self.packet.connection()
    }

    /// Returns `true` if the parent packet's connection should be closed.
    #[must_use]
    pub fn close_requested(&self) -> bool {
        self.packet.close_requested()
    }
}

impl ByteRead for SubPacketReader<'_> {
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
        debug!(
            connection = ?self.packet.connection(),
            %underrun,
            "read past end of sub-view"
        );
        self.packet.flag_violation(ProtocolViolation::Underrun(underrun));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use serial::ByteWrite;

    const CONN: ConnectionId = ConnectionId::new(4);

    #[test]
    fn truncated_frame_underrun() {
        let packet = Packet::inbound(CONN, 64, 2);
        let truncated = [0x08, 0x00, 0x05, 0x34, 0x12];
        let mut reader = SubPacketReader::over(&packet, &truncated, HEADER_SIZE);

        assert_eq!(reader.read_u16(), 0x1234);
        assert!(!reader.close_requested());
        assert_eq!(reader.read_string(), "");
        assert!(reader.close_requested());
        assert_eq!(
            packet.violation(),
            Some(ProtocolViolation::Underrun(Underrun {
                requested: 1,
                available: 0,
                position: 5
            }))
        );
    }

    #[test]
    fn nested_range_decodes_in_place() {
        let mut outbound = Packet::outbound(6, 64);
        let mut inner = serial::BoundedWriter::new(32);
        inner.write_u32(0xDEAD_BEEF).unwrap();
        inner.write_string("sub").unwrap();
        outbound.write_buffer(inner.as_bytes()).unwrap();
        outbound.write_u8(1).unwrap();
        outbound.prepare_to_send().unwrap();

        let mut packet = Packet::received(CONN, 64, outbound.as_bytes()).unwrap();
        let range = packet.read_nested().unwrap();
        let trailer = packet.read_u8();

        let mut reader = SubPacketReader::new(&packet, range, 0);
        assert_eq!(reader.read_u32(), 0xDEAD_BEEF);
        assert_eq!(reader.read_string(), "sub");
        assert_eq!(reader.remaining(), 0);
        assert_eq!(trailer, 1);
        assert!(!packet.close_requested());
    }

    #[test]
    fn nested_underrun_flags_parent() {
        let packet = Packet::received(CONN, 64, &[5, 0, 1, 0xAA, 0xBB]).unwrap();
        let mut reader = SubPacketReader::new(&packet, 3..5, 0);
        assert_eq!(reader.read_u32(), 0);
        assert_eq!(reader.position(), 0);
        assert!(packet.close_requested());
    }

    #[test]
    fn tolerant_sub_view_does_not_flag() {
        let packet = Packet::received(CONN, 64, &[4, 0, 1, 0xAA]).unwrap();
        let mut reader = SubPacketReader::new(&packet, 3..4, 0);
        assert_eq!(reader.read_u8(), 0xAA);
        assert_eq!(reader.tolerant().read_u16(), 0);
        assert!(!packet.close_requested());
    }

    #[test]
    fn out_of_range_is_empty() {
        let packet = Packet::received(CONN, 64, &[3, 0, 1]).unwrap();
        let reader = SubPacketReader::new(&packet, 10..20, 0);
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.connection(), Some(CONN));
    }

    #[test]
    fn start_position_is_clamped() {
        let packet = Packet::inbound(CONN, 64, 2);
        let data = [1, 2];
        let reader = SubPacketReader::over(&packet, &data, 9);
        assert_eq!(reader.position(), 2);
    }
}
