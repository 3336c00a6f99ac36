//! Per-connection send queue and receive state over a stream transport.
//!
//! A [`Channel`] is what a connection state machine drives when its socket
//! becomes writable or readable. It owns the packet currently being received
//! and the finalized packets waiting to be sent, and calls the transfer
//! adapters until the transport stops making progress.

use std::collections::VecDeque;
use std::io;

use tracing::{debug, trace};

use crate::connection::ConnectionId;
use crate::error::{ChannelError, FramingError, TransferError};
use crate::header::{PacketType, SIZE_FIELD_LEN};
use crate::limits::Limits;
use crate::packet::{Packet, PacketMode};

/// Outcome of a send pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// The queue is empty.
    AllSent,
    /// The transport would block with packets still queued.
    PartlySent,
}

/// Send and receive state for one stream connection.
#[derive(Debug)]
pub struct Channel {
    connection: ConnectionId,
    limits: Limits,
    receiving: Option<Packet>,
    queue: VecDeque<Packet>,
}

impl Channel {
    #[must_use]
    pub fn new(connection: ConnectionId, limits: Limits) -> Self {
        Self {
            connection,
            limits,
            receiving: None,
            queue: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn connection(&self) -> ConnectionId {
        self.connection
    }

    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Starts an outbound packet bounded by this channel's packet limit.
    #[must_use]
    pub fn begin_outbound(&self, packet_type: PacketType) -> Packet {
        Packet::outbound(packet_type, self.limits.packet_limit())
    }

    /// Starts an inbound packet that first receives just the size field.
    #[must_use]
    pub fn begin_inbound(&self) -> Packet {
        Packet::inbound(self.connection, self.limits.packet_limit(), SIZE_FIELD_LEN)
    }

    /// Queues a packet for sending, finalizing it if it is still being written.
    pub fn send_packet(&mut self, mut packet: Packet) -> Result<(), ChannelError> {
        let limit = self.limits.max_queued_packets;
        if self.queue.len() >= limit {
            return Err(ChannelError::QueueFull { limit });
        }
        if packet.mode() == PacketMode::Write {
            packet.prepare_to_send()?;
        }
        if packet.mode() != PacketMode::Send {
            return Err(TransferError::WrongMode {
                expected: PacketMode::Send,
                actual: packet.mode(),
            }
            .into());
        }
        self.queue.push_back(packet);
        Ok(())
    }

    /// Number of packets waiting to be sent.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if a packet is partially received.
    #[must_use]
    pub fn is_receiving(&self) -> bool {
        self.receiving.is_some()
    }

    /// Sends queued packets until the queue is empty or the transport would block.
    ///
    /// A transport that accepts zero bytes is treated as closed by the peer.
    pub fn send_packets<D, F>(
        &mut self,
        mut transfer: F,
        destination: &mut D,
    ) -> Result<SendState, ChannelError>
    where
        D: ?Sized,
        F: FnMut(&mut D, &[u8]) -> io::Result<usize>,
    {
        while let Some(packet) = self.queue.front_mut() {
            if packet.remaining_bytes_to_transfer() > 0 {
                match packet.transfer_out(&mut transfer, &mut *destination) {
                    Ok(0) => return Err(ChannelError::PeerClosed),
                    Ok(_) => {}
                    Err(err) if err.is_would_block() => return Ok(SendState::PartlySent),
                    Err(err) => return Err(err.into()),
                }
            }
            if packet.remaining_bytes_to_transfer() == 0 {
                trace!(
                    connection = %self.connection,
                    packet_type = packet.packet_type(),
                    "packet sent"
                );
                self.queue.pop_front();
            }
        }
        Ok(SendState::AllSent)
    }

    /// Receives until one packet is complete or the transport would block.
    ///
    /// Returns the packet in read mode, or `None` if more data is needed.
    /// A partially received packet is kept between calls and discarded on
    /// any error.
    pub fn receive_packet<S, F>(
        &mut self,
        mut transfer: F,
        source: &mut S,
    ) -> Result<Option<Packet>, ChannelError>
    where
        S: ?Sized,
        F: FnMut(&mut S, &mut [u8]) -> io::Result<usize>,
    {
        let result = self.pump_receive(&mut transfer, source);
        if result.is_err() {
            self.receiving = None;
        }
        result
    }

    fn pump_receive<S, F>(
        &mut self,
        transfer: &mut F,
        source: &mut S,
    ) -> Result<Option<Packet>, ChannelError>
    where
        S: ?Sized,
        F: FnMut(&mut S, &mut [u8]) -> io::Result<usize>,
    {
        let (connection, limit) = (self.connection, self.limits.packet_limit());
        let packet = self
            .receiving
            .get_or_insert_with(|| Packet::inbound(connection, limit, SIZE_FIELD_LEN));
        loop {
            if packet.is_ready() {
                break;
            }
            if packet.has_packet_size_data() && packet.declared_size().is_none() {
                packet.parse_packet_size()?;
                continue;
            }
            match packet.transfer_in(&mut *transfer, &mut *source) {
                Ok(0) => return Err(ChannelError::PeerClosed),
                Ok(_) => {}
                Err(err) if err.is_would_block() => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        }

        let Some(mut packet) = self.receiving.take() else {
            return Ok(None);
        };
        let packet_type = packet.prepare_to_read()?;
        debug!(
            connection = %self.connection,
            packet_type,
            size = packet.size(),
            "packet received"
        );
        Ok(Some(packet))
    }
}

/// Receives one packet from a datagram transport.
///
/// The whole datagram is read in a single transfer and must carry exactly the
/// number of bytes its header declares. Returns `None` if the transport would
/// block.
pub fn receive_datagram<S, F>(
    connection: ConnectionId,
    limits: &Limits,
    transfer: F,
    source: &mut S,
) -> Result<Option<Packet>, ChannelError>
where
    S: ?Sized,
    F: FnOnce(&mut S, &mut [u8]) -> io::Result<usize>,
{
    let mut packet = Packet::inbound(connection, limits.packet_limit(), usize::MAX);
    let received = match packet.transfer_in(transfer, source) {
        Ok(received) => received,
        Err(err) if err.is_would_block() => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    if received < SIZE_FIELD_LEN {
        let err = FramingError::Truncated { received };
        packet.flag_framing(err);
        return Err(ChannelError::Framing(err));
    }
    packet.parse_packet_size()?;
    packet.verify_datagram(received)?;
    let packet_type = packet.prepare_to_read()?;
    trace!(%connection, packet_type, received, "datagram received");
    Ok(Some(packet))
}
