//! Configurable limits for packets and channels.

use crate::header::{COMPAT_MTU, HEADER_SIZE, MAX_PACKET_SIZE, TCP_MTU};

/// Per-connection packet limits.
///
/// `max_packet_bytes` bounds both what the local encoder may write and what a
/// peer may declare in a size header. It is clamped to what the size field
/// can express, see [`packet_limit`](Self::packet_limit).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    /// Maximum total packet size in bytes, header included.
    pub max_packet_bytes: usize,

    /// Maximum number of finalized packets waiting in a send queue.
    pub max_queued_packets: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_packet_bytes: TCP_MTU,
            max_queued_packets: 256,
        }
    }
}

impl Limits {
    /// Limits for datagram transports, where a packet must fit one datagram.
    #[must_use]
    pub const fn for_datagrams() -> Self {
        Self {
            max_packet_bytes: COMPAT_MTU,
            max_queued_packets: 256,
        }
    }

    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_packet_bytes: 64,
            max_queued_packets: 4,
        }
    }

    /// The packet limit actually enforced, within `HEADER_SIZE..=MAX_PACKET_SIZE`.
    #[must_use]
    pub const fn packet_limit(&self) -> usize {
        clamp_packet_limit(self.max_packet_bytes)
    }
}

/// Clamps a requested packet limit to the range the frame header supports.
#[must_use]
pub const fn clamp_packet_limit(limit: usize) -> usize {
    if limit < HEADER_SIZE {
        HEADER_SIZE
    } else if limit > MAX_PACKET_SIZE {
        MAX_PACKET_SIZE
    } else {
        limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_packet_bytes() {
        let limits = Limits::default();
        assert_eq!(limits.max_packet_bytes, TCP_MTU);
        assert_eq!(limits.packet_limit(), TCP_MTU);
    }

    #[test]
    fn datagram_limits() {
        let limits = Limits::for_datagrams();
        assert_eq!(limits.packet_limit(), 1460);
    }

    #[test]
    fn testing_limits_smaller() {
        let test_limits = Limits::for_testing();
        let default_limits = Limits::default();

        assert!(test_limits.max_packet_bytes < default_limits.max_packet_bytes);
        assert!(test_limits.max_queued_packets < default_limits.max_queued_packets);
    }

    #[test]
    fn packet_limit_clamped_high() {
        let limits = Limits {
            max_packet_bytes: usize::MAX,
            ..Limits::default()
        };
        assert_eq!(limits.packet_limit(), MAX_PACKET_SIZE);
    }

    #[test]
    fn packet_limit_clamped_low() {
        assert_eq!(clamp_packet_limit(0), HEADER_SIZE);
        assert_eq!(clamp_packet_limit(HEADER_SIZE), HEADER_SIZE);
    }

    #[test]
    fn limits_const_constructible() {
        const LIMITS: Limits = Limits::for_testing();
        assert_eq!(LIMITS.max_packet_bytes, 64);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn limits_serde_defaults_missing_fields() {
        let limits: Limits = serde_json::from_str(r#"{"max_packet_bytes": 512}"#).unwrap();
        assert_eq!(limits.max_packet_bytes, 512);
        assert_eq!(limits.max_queued_packets, 256);
    }
}
