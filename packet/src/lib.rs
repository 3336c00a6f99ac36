//! Framed, bounded packets and the glue that moves them over a transport.
//!
//! This crate builds on the [`serial`] primitives. A [`Packet`] carries one
//! typed message with a size header; [`SubPacketReader`] decodes nested
//! payloads in place; the transfer adapters on [`Packet`] move bytes through
//! any non-blocking transport function; [`Channel`] and [`ConnectionRegistry`]
//! give a connection state machine somewhere to keep its queues and close
//! signals.
//!
//! # Design Principles
//!
//! - **Never exceed the limit** - Encoding past a packet's limit fails loudly;
//!   a peer declaring more than the limit is rejected before any allocation.
//! - **Resumable transfers** - Every adapter call moves what the transport
//!   accepts and no more, so partial sends and receives simply continue.
//! - **Close, don't crash** - Malformed input from a peer becomes a
//!   [`ProtocolViolation`] the owning connection acts on.
//! - **No domain knowledge** - This crate frames messages, it does not know
//!   what any type tag means.
//!
//! # Example
//!
//! ```
//! use packet::{ConnectionId, Packet};
//! use serial::{ByteRead, ByteWrite};
//!
//! let mut outbound = Packet::outbound(5, 64);
//! outbound.write_u16(0x1234).unwrap();
//! outbound.write_string("hi").unwrap();
//! outbound.prepare_to_send().unwrap();
//! assert_eq!(outbound.as_bytes(), [8, 0, 5, 0x34, 0x12, b'h', b'i', 0]);
//!
//! let mut inbound = Packet::received(ConnectionId::new(0), 64, outbound.as_bytes()).unwrap();
//! assert_eq!(inbound.packet_type(), 5);
//! assert_eq!(inbound.read_u16(), 0x1234);
//! assert_eq!(inbound.read_string(), "hi");
//! assert!(!inbound.close_requested());
//! ```

mod channel;
mod connection;
mod error;
mod header;
mod limits;
mod packet;
mod subview;
mod transfer;

pub use channel::{receive_datagram, Channel, SendState};
pub use connection::{CloseReason, ConnectionContext, ConnectionId, ConnectionRegistry};
pub use error::{
    ChannelError, FramingError, PacketError, PacketResult, ProtocolViolation, TransferError,
};
pub use header::{
    read_size_field, FrameHeader, PacketSize, PacketType, COMPAT_MTU, HEADER_SIZE,
    MAX_PACKET_SIZE, SIZE_FIELD_LEN, TCP_MTU, TYPE_FIELD_LEN,
};
pub use limits::{clamp_packet_limit, Limits};
pub use packet::{Packet, PacketMode};
pub use subview::SubPacketReader;
