//! Bounded serialization primitives for netpack packets.
//!
//! This crate provides the [`ByteWrite`] and [`ByteRead`] capabilities used by
//! packets and sub-views, plus the standalone [`BoundedWriter`] and
//! [`SliceReader`] implementations.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Fixed layout** - Integers are little-endian regardless of host; strings
//!   are raw bytes plus a single zero terminator with no length prefix.
//! - **Bounded writes** - A write that would exceed the limit fails and leaves
//!   the buffer untouched.
//! - **Forgiving reads** - Reading past the end yields zero values or empty
//!   strings and optionally records an [`Underrun`]; it never panics.
//!
//! # Example
//!
//! ```
//! use serial::{BoundedWriter, ByteRead, ByteWrite, SliceReader};
//!
//! let mut writer = BoundedWriter::new(16);
//! writer.write_u16(0x1234).unwrap();
//! writer.write_string("hi").unwrap();
//!
//! let bytes = writer.finish();
//! assert_eq!(bytes, [0x34, 0x12, b'h', b'i', 0]);
//!
//! let mut reader = SliceReader::new(&bytes);
//! assert_eq!(reader.read_u16(), 0x1234);
//! assert_eq!(reader.read_string(), "hi");
//! assert!(!reader.close_requested());
//! ```

mod error;
mod read;
mod write;

pub use error::{Underrun, WriteError, WriteResult};
pub use read::{ByteRead, SliceReader, Tolerant};
pub use write::{BoundedWriter, ByteWrite};
