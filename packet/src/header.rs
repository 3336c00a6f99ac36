//! Frame header layout and size constants.

/// Integer type of the size field.
pub type PacketSize = u16;

/// Integer type of the message type tag.
pub type PacketType = u8;

/// Width of the size field in bytes.
pub const SIZE_FIELD_LEN: usize = std::mem::size_of::<PacketSize>();

/// Width of the type tag in bytes.
pub const TYPE_FIELD_LEN: usize = std::mem::size_of::<PacketType>();

/// Size of the frame header (size field + type tag). Also the smallest valid packet.
pub const HEADER_SIZE: usize = SIZE_FIELD_LEN + TYPE_FIELD_LEN;

/// Largest packet the size field can describe.
pub const MAX_PACKET_SIZE: usize = PacketSize::MAX as usize;

/// Default packet limit for stream connections.
pub const TCP_MTU: usize = 32_767;

/// Packet limit that fits a datagram on any common path MTU.
pub const COMPAT_MTU: usize = 1_460;

/// The fixed fields at the start of every framed packet.
///
/// Layout (little-endian):
///
/// ```text
/// [size: u16][type: u8][fields...]
/// ```
///
/// `size` counts the whole packet, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    /// Total packet length in bytes.
    pub size: PacketSize,
    /// Message type tag.
    pub packet_type: PacketType,
}

impl FrameHeader {
    /// Creates a header.
    #[must_use]
    pub const fn new(size: PacketSize, packet_type: PacketType) -> Self {
        Self { size, packet_type }
    }

    /// Parses the header from the start of `buf`.
    ///
    /// Returns `None` if `buf` is shorter than [`HEADER_SIZE`]. The size is
    /// not validated here.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let size = read_size_field(buf)?;
        let packet_type = *buf.get(SIZE_FIELD_LEN)?;
        Some(Self { size, packet_type })
    }

    /// Encodes the header.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let size = self.size.to_le_bytes();
        [size[0], size[1], self.packet_type]
    }

    /// Number of payload bytes after the header, or `None` if the size is
    /// smaller than the header itself.
    #[must_use]
    pub const fn payload_len(self) -> Option<usize> {
        (self.size as usize).checked_sub(HEADER_SIZE)
    }
}

/// Reads the size field from the start of `buf`.
#[must_use]
pub fn read_size_field(buf: &[u8]) -> Option<PacketSize> {
    let bytes = buf.get(..SIZE_FIELD_LEN)?;
    Some(PacketSize::from_le_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_three() {
        assert_eq!(SIZE_FIELD_LEN, 2);
        assert_eq!(TYPE_FIELD_LEN, 1);
        assert_eq!(HEADER_SIZE, 3);
    }

    #[test]
    fn mtu_constants_fit_size_field() {
        assert!(TCP_MTU <= MAX_PACKET_SIZE);
        assert!(COMPAT_MTU <= TCP_MTU);
        assert_eq!(MAX_PACKET_SIZE, 65_535);
    }

    #[test]
    fn parse_header() {
        let header = FrameHeader::parse(&[0x08, 0x00, 0x05, 0x34]).unwrap();
        assert_eq!(header, FrameHeader::new(8, 5));
        assert_eq!(header.payload_len(), Some(5));
    }

    #[test]
    fn parse_short_buffer() {
        assert_eq!(FrameHeader::parse(&[0x08, 0x00]), None);
        assert_eq!(FrameHeader::parse(&[]), None);
    }

    #[test]
    fn header_to_bytes() {
        assert_eq!(FrameHeader::new(0x0102, 9).to_bytes(), [0x02, 0x01, 9]);
    }

    #[test]
    fn payload_len_of_undersized_header() {
        assert_eq!(FrameHeader::new(2, 0).payload_len(), None);
        assert_eq!(FrameHeader::new(3, 0).payload_len(), Some(0));
    }

    #[test]
    fn size_field_little_endian() {
        assert_eq!(read_size_field(&[0x34, 0x12]), Some(0x1234));
        assert_eq!(read_size_field(&[0x34]), None);
    }

    #[test]
    fn header_const_constructible() {
        const HEADER: FrameHeader = FrameHeader::new(3, 1);
        assert_eq!(HEADER.to_bytes(), [3, 0, 1]);
    }
}
