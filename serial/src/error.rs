//! Error types for serialization primitives.

use std::fmt;

/// Result type for write operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Errors that can occur while encoding fields.
///
/// Every variant means the write did not happen: the buffer is left exactly
/// as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// Writing would grow the buffer past its size limit.
    Overflow {
        /// Total buffer length the write would have produced.
        needed: usize,
        /// Configured maximum buffer length.
        limit: usize,
    },

    /// A string contained a zero byte, which would end it early on the wire.
    EmbeddedNul {
        /// Byte offset of the first zero byte within the string.
        position: usize,
    },

    /// A length-prefixed buffer is longer than its `u16` prefix can express.
    LengthOverflow {
        /// The rejected length.
        length: usize,
    },

    /// The target is not accepting writes (e.g. a packet already finalized).
    NotWritable,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { needed, limit } => {
                write!(
                    f,
                    "write would need {needed} bytes but the limit is {limit} bytes"
                )
            }
            Self::EmbeddedNul { position } => {
                write!(f, "string contains a zero byte at offset {position}")
            }
            Self::LengthOverflow { length } => {
                write!(f, "buffer length {length} does not fit a u16 length prefix")
            }
            Self::NotWritable => write!(f, "buffer is not in write mode"),
        }
    }
}

impl std::error::Error for WriteError {}

/// Describes a read that asked for more bytes than were available.
///
/// Underruns are not errors: the read resolves to a zero value or an empty
/// string. An `Underrun` is only recorded when the reader was asked to treat
/// the condition as a reason to close the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underrun {
    /// Number of bytes the read needed.
    pub requested: usize,
    /// Number of bytes that were left.
    pub available: usize,
    /// Cursor position at the time of the read.
    pub position: usize,
}

impl fmt::Display for Underrun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted to read {} bytes at offset {} but only {} bytes available",
            self.requested, self.position, self.available
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_overflow() {
        let err = WriteError::Overflow {
            needed: 1461,
            limit: 1460,
        };
        let msg = err.to_string();
        assert!(msg.contains("1461"), "should mention needed bytes");
        assert!(msg.contains("1460"), "should mention the limit");
    }

    #[test]
    fn error_display_embedded_nul() {
        let err = WriteError::EmbeddedNul { position: 3 };
        assert!(err.to_string().contains("offset 3"));
    }

    #[test]
    fn error_display_length_overflow() {
        let err = WriteError::LengthOverflow { length: 70_000 };
        let msg = err.to_string();
        assert!(msg.contains("70000"));
        assert!(msg.contains("u16"));
    }

    #[test]
    fn underrun_display() {
        let underrun = Underrun {
            requested: 4,
            available: 1,
            position: 7,
        };
        let msg = underrun.to_string();
        assert!(msg.contains("4 bytes"), "should mention requested bytes");
        assert!(msg.contains("offset 7"), "should mention the position");
        assert!(msg.contains("1 bytes"), "should mention available bytes");
    }

    #[test]
    fn error_equality() {
        let err1 = WriteError::Overflow {
            needed: 8,
            limit: 7,
        };
        let err2 = WriteError::Overflow {
            needed: 8,
            limit: 7,
        };
        let err3 = WriteError::NotWritable;
        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<WriteError>();
    }
}
