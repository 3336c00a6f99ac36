//! Adapters that move a packet's bytes to and from a transport function.
//!
//! A transport function has the shape of a non-blocking socket call: it is
//! offered a slice and returns how many bytes it actually moved. Each adapter
//! makes at most one call and advances the packet cursor by exactly the
//! amount reported. Retrying is left to the caller.
//!
//! [`std::io::Write::write`] and [`std::io::Read::read`] have the right shape:
//!
//! ```
//! use std::io::Write;
//! use packet::Packet;
//!
//! let mut packet = Packet::outbound(1, 64);
//! packet.prepare_to_send().unwrap();
//!
//! let mut wire: Vec<u8> = Vec::new();
//! let sent = packet.transfer_out(Write::write, &mut wire).unwrap();
//! assert_eq!(sent, 3);
//! assert_eq!(wire, [3, 0, 1]);
//! ```

use std::io;

use tracing::{debug, trace};

use crate::error::TransferError;
use crate::packet::{Packet, PacketMode};

impl Packet {
    /// Offers the unsent remainder to `transfer`, capped at `limit` bytes.
    ///
    /// Returns the number of bytes sent. `Ok(0)` means nothing moved this
    /// call; it is also returned without calling `transfer` when there is
    /// nothing left to send or `limit` is zero.
    pub fn transfer_out_with_limit<D, F>(
        &mut self,
        transfer: F,
        limit: usize,
        destination: &mut D,
    ) -> Result<usize, TransferError>
    where
        D: ?Sized,
        F: FnOnce(&mut D, &[u8]) -> io::Result<usize>,
    {
        self.expect_transfer_mode(PacketMode::Send)?;
        let amount = self.remaining_bytes_to_transfer().min(limit);
        if amount == 0 {
            return Ok(0);
        }

        let sent = transfer(destination, self.buffer_from_cursor(amount))
            .map_err(|err| transport_error(err, "send"))?;
        self.advance(amount, sent)?;
        trace!(
            sent,
            remaining = self.remaining_bytes_to_transfer(),
            "transferred packet bytes out"
        );
        Ok(sent)
    }

    /// Offers the whole unsent remainder to `transfer`.
    pub fn transfer_out<D, F>(&mut self, transfer: F, destination: &mut D) -> Result<usize, TransferError>
    where
        D: ?Sized,
        F: FnOnce(&mut D, &[u8]) -> io::Result<usize>,
    {
        self.transfer_out_with_limit(transfer, usize::MAX, destination)
    }

    /// Lets `transfer` fill the unreceived remainder of the buffer.
    ///
    /// Returns the number of bytes received. `Ok(0)` is returned without
    /// calling `transfer` when the buffer is already full.
    pub fn transfer_in<S, F>(&mut self, transfer: F, source: &mut S) -> Result<usize, TransferError>
    where
        S: ?Sized,
        F: FnOnce(&mut S, &mut [u8]) -> io::Result<usize>,
    {
        self.expect_transfer_mode(PacketMode::Receive)?;
        let amount = self.remaining_bytes_to_transfer();
        if amount == 0 {
            return Ok(0);
        }

        let received = transfer(source, self.buffer_from_cursor_mut(amount))
            .map_err(|err| transport_error(err, "receive"))?;
        self.advance(amount, received)?;
        trace!(
            received,
            remaining = self.remaining_bytes_to_transfer(),
            "transferred packet bytes in"
        );
        Ok(received)
    }

    fn expect_transfer_mode(&self, expected: PacketMode) -> Result<(), TransferError> {
        let actual = self.mode();
        if actual == expected {
            Ok(())
        } else {
            Err(TransferError::WrongMode { expected, actual })
        }
    }

    fn advance(&mut self, requested: usize, reported: usize) -> Result<(), TransferError> {
        if reported > requested {
            return Err(TransferError::Overreported {
                requested,
                reported,
            });
        }
        self.advance_cursor(reported);
        Ok(())
    }
}

fn transport_error(err: io::Error, direction: &str) -> TransferError {
    if err.kind() != io::ErrorKind::WouldBlock {
        debug!(direction, %err, "transport call failed");
    }
    TransferError::Transport(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use crate::header::{HEADER_SIZE, SIZE_FIELD_LEN};
    use serial::ByteWrite;
    use std::io::{Read, Write};

    fn sample() -> Packet {
        let mut packet = Packet::outbound(5, 64);
        packet.write_u16(0x1234).unwrap();
        packet.write_string("hi").unwrap();
        packet.prepare_to_send().unwrap();
        packet
    }

    fn one_byte_out(wire: &mut Vec<u8>, buf: &[u8]) -> io::Result<usize> {
        assert!(!buf.is_empty());
        wire.push(buf[0]);
        Ok(1)
    }

    fn one_byte_in(source: &mut &[u8], buf: &mut [u8]) -> io::Result<usize> {
        assert!(!buf.is_empty());
        let (first, rest) = source
            .split_first()
            .ok_or_else(|| io::Error::from(io::ErrorKind::WouldBlock))?;
        buf[0] = *first;
        *source = rest;
        Ok(1)
    }

    #[test]
    fn send_all_at_once() {
        let mut packet = sample();
        let mut wire: Vec<u8> = Vec::new();
        assert_eq!(packet.transfer_out(Write::write, &mut wire).unwrap(), 8);
        assert_eq!(wire, [0x08, 0x00, 0x05, 0x34, 0x12, 0x68, 0x69, 0x00]);
        assert_eq!(packet.remaining_bytes_to_transfer(), 0);
        assert_eq!(packet.transfer_out(Write::write, &mut wire).unwrap(), 0);
    }

    #[test]
    fn one_byte_per_call_send_converges() {
        let mut packet = sample();
        let size = packet.size();
        let mut wire: Vec<u8> = Vec::new();
        let mut calls = 0;
        while packet.remaining_bytes_to_transfer() > 0 {
            assert_eq!(packet.transfer_out(one_byte_out, &mut wire).unwrap(), 1);
            calls += 1;
        }
        assert_eq!(calls, size);
        assert_eq!(wire, packet.as_bytes());
    }

    #[test]
    fn one_byte_per_call_receive_converges() {
        let frame = sample().as_bytes().to_vec();
        let mut source: &[u8] = &frame;
        let mut packet = Packet::inbound(ConnectionId::new(1), 64, SIZE_FIELD_LEN);
        let mut calls = 0;

        while !packet.has_packet_size_data() {
            packet.transfer_in(one_byte_in, &mut source).unwrap();
            calls += 1;
        }
        assert_eq!(packet.parse_packet_size().unwrap(), frame.len());
        while !packet.is_ready() {
            assert_eq!(packet.transfer_in(one_byte_in, &mut source).unwrap(), 1);
            calls += 1;
        }

        assert_eq!(calls, frame.len());
        assert_eq!(packet.as_bytes(), frame.as_slice());
        assert_eq!(packet.prepare_to_read().unwrap(), 5);
    }

    #[test]
    fn limit_caps_each_call() {
        let mut packet = sample();
        let mut wire: Vec<u8> = Vec::new();
        assert_eq!(
            packet
                .transfer_out_with_limit(Write::write, HEADER_SIZE, &mut wire)
                .unwrap(),
            HEADER_SIZE
        );
        assert_eq!(wire, [0x08, 0x00, 0x05]);
        assert_eq!(packet.remaining_bytes_to_transfer(), 5);
    }

    #[test]
    fn zero_amount_skips_transport() {
        let mut packet = sample();
        let mut called = false;
        let sent = packet
            .transfer_out_with_limit(
                |called: &mut bool, _: &[u8]| {
                    *called = true;
                    Ok(0)
                },
                0,
                &mut called,
            )
            .unwrap();
        assert_eq!(sent, 0);
        assert!(!called);
    }

    #[test]
    fn read_adapter_fills_from_reader() {
        let frame = sample().as_bytes().to_vec();
        let mut source = io::Cursor::new(frame.clone());
        let mut packet = Packet::inbound(ConnectionId::new(1), 64, SIZE_FIELD_LEN);
        assert_eq!(packet.transfer_in(Read::read, &mut source).unwrap(), 2);
        packet.parse_packet_size().unwrap();
        assert_eq!(packet.transfer_in(Read::read, &mut source).unwrap(), 6);
        assert!(packet.is_ready());
        assert_eq!(packet.transfer_in(Read::read, &mut source).unwrap(), 0);
    }

    #[test]
    fn transport_error_passes_through() {
        let mut packet = sample();
        let err = packet
            .transfer_out(
                |_: &mut (), _: &[u8]| Err(io::Error::from(io::ErrorKind::ConnectionReset)),
                &mut (),
            )
            .unwrap_err();
        assert!(
            matches!(err, TransferError::Transport(ref e) if e.kind() == io::ErrorKind::ConnectionReset)
        );
        assert_eq!(packet.remaining_bytes_to_transfer(), 8);
    }

    #[test]
    fn would_block_moves_nothing() {
        let mut packet = Packet::inbound(ConnectionId::new(1), 64, SIZE_FIELD_LEN);
        let mut source: &[u8] = &[];
        let err = packet.transfer_in(one_byte_in, &mut source).unwrap_err();
        assert!(err.is_would_block());
        assert!(!packet.has_packet_size_data());
    }

    #[test]
    fn overreport_is_rejected() {
        let mut packet = sample();
        let err = packet
            .transfer_out(|_: &mut (), buf: &[u8]| Ok(buf.len() + 1), &mut ())
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Overreported {
                requested: 8,
                reported: 9
            }
        ));
        assert_eq!(packet.remaining_bytes_to_transfer(), 8);
    }

    #[test]
    fn wrong_mode_is_rejected() {
        let mut packet = Packet::outbound(1, 64);
        let mut wire: Vec<u8> = Vec::new();
        assert!(matches!(
            packet.transfer_out(Write::write, &mut wire),
            Err(TransferError::WrongMode {
                expected: PacketMode::Send,
                actual: PacketMode::Write
            })
        ));

        let mut source: &[u8] = &[1, 2, 3];
        assert!(matches!(
            packet.transfer_in(Read::read, &mut source),
            Err(TransferError::WrongMode {
                expected: PacketMode::Receive,
                ..
            })
        ));
    }
}
