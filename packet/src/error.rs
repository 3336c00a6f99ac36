//! Error types for packet framing and transfer.

use std::fmt;
use std::io;

use serial::{Underrun, WriteError};

use crate::packet::PacketMode;

/// Result type for packet lifecycle operations.
pub type PacketResult<T> = Result<T, PacketError>;

/// A peer sent a size header the packet cannot accept.
///
/// Framing errors are fatal to the connection that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// Declared length is smaller than the size and type fields.
    TooSmall { declared: usize, minimum: usize },

    /// Declared length exceeds the packet limit.
    TooLarge { declared: usize, limit: usize },

    /// A datagram's declared length differs from the bytes received.
    SizeMismatch { declared: usize, received: usize },

    /// A datagram ended before its size field.
    Truncated { received: usize },
}

/// Errors from driving a packet through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// The operation is not valid in the packet's current mode.
    WrongMode {
        expected: PacketMode,
        actual: PacketMode,
    },

    /// The packet still has bytes to receive.
    Incomplete { remaining: usize },

    /// A back-patch offset does not address two written payload bytes.
    OffsetOutOfBounds { offset: usize, size: usize },

    /// Encoding failed.
    Write(WriteError),

    /// The declared size was rejected.
    Framing(FramingError),
}

/// Errors from a single transfer adapter call.
#[derive(Debug)]
pub enum TransferError {
    /// The transport function failed; the error is passed through unchanged.
    Transport(io::Error),

    /// The packet is not in a transferable mode.
    WrongMode {
        expected: PacketMode,
        actual: PacketMode,
    },

    /// The transport claimed to move more bytes than it was offered.
    Overreported { requested: usize, reported: usize },
}

/// Errors from a channel's send or receive pass.
#[derive(Debug)]
pub enum ChannelError {
    /// The peer closed the stream (a transfer moved zero bytes).
    PeerClosed,

    /// The send queue is full.
    QueueFull { limit: usize },

    /// A transfer failed.
    Transfer(TransferError),

    /// The peer violated the framing rules.
    Framing(FramingError),

    /// A packet was used out of order.
    Packet(PacketError),
}

/// A peer-induced condition that requires closing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A decode read past the end of a peer-supplied packet.
    Underrun(Underrun),

    /// The peer's size header was rejected.
    Framing(FramingError),
}

impl TransferError {
    /// Returns `true` if the transport reported that it would block.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Transport(err) if err.kind() == io::ErrorKind::WouldBlock)
    }
}

impl From<WriteError> for PacketError {
    fn from(err: WriteError) -> Self {
        Self::Write(err)
    }
}

impl From<FramingError> for PacketError {
    fn from(err: FramingError) -> Self {
        Self::Framing(err)
    }
}

impl From<TransferError> for ChannelError {
    fn from(err: TransferError) -> Self {
        Self::Transfer(err)
    }
}

impl From<FramingError> for ChannelError {
    fn from(err: FramingError) -> Self {
        Self::Framing(err)
    }
}

impl From<PacketError> for ChannelError {
    fn from(err: PacketError) -> Self {
        match err {
            PacketError::Framing(framing) => Self::Framing(framing),
            other => Self::Packet(other),
        }
    }
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall { declared, minimum } => {
                write!(
                    f,
                    "declared packet size {declared} is below the minimum of {minimum}"
                )
            }
            Self::TooLarge { declared, limit } => {
                write!(f, "declared packet size {declared} exceeds the limit of {limit}")
            }
            Self::SizeMismatch { declared, received } => {
                write!(
                    f,
                    "declared packet size {declared} but {received} bytes were received"
                )
            }
            Self::Truncated { received } => {
                write!(f, "datagram of {received} bytes is too short for a size field")
            }
        }
    }
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongMode { expected, actual } => {
                write!(f, "packet is in {actual} mode, expected {expected} mode")
            }
            Self::Incomplete { remaining } => {
                write!(f, "packet is incomplete: {remaining} bytes still to receive")
            }
            Self::OffsetOutOfBounds { offset, size } => {
                write!(f, "offset {offset} is outside the {size}-byte payload")
            }
            Self::Write(err) => write!(f, "write failed: {err}"),
            Self::Framing(err) => write!(f, "framing violation: {err}"),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "transport error: {err}"),
            Self::WrongMode { expected, actual } => {
                write!(f, "cannot transfer a packet in {actual} mode, expected {expected} mode")
            }
            Self::Overreported {
                requested,
                reported,
            } => {
                write!(
                    f,
                    "transport reported {reported} bytes moved but only {requested} were offered"
                )
            }
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "connection closed by peer"),
            Self::QueueFull { limit } => write!(f, "send queue is full ({limit} packets)"),
            Self::Transfer(err) => write!(f, "{err}"),
            Self::Framing(err) => write!(f, "framing violation: {err}"),
            Self::Packet(err) => write!(f, "{err}"),
        }
    }
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underrun(underrun) => write!(f, "underrun: {underrun}"),
            Self::Framing(err) => write!(f, "framing violation: {err}"),
        }
    }
}

impl std::error::Error for FramingError {}

impl std::error::Error for PacketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Write(err) => Some(err),
            Self::Framing(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transfer(err) => Some(err),
            Self::Framing(err) => Some(err),
            Self::Packet(err) => Some(err),
            _ => None,
        }
    }
}
