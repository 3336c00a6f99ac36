//! Connection identifiers and the registry that owns connection state.
//!
//! Packets refer to their connection only by [`ConnectionId`]. Whatever
//! drives the connections owns a [`ConnectionRegistry`] and feeds it the
//! close signals packets and channels produce.

use std::collections::HashMap;
use std::fmt;
use std::io;

use tracing::{debug, info};

use crate::error::{ChannelError, ProtocolViolation, TransferError};
use crate::packet::Packet;

/// Opaque handle naming a connection in a [`ConnectionRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u32);

impl ConnectionId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Why a connection must be torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer broke the protocol.
    Violation(ProtocolViolation),
    /// The peer closed the stream.
    PeerClosed,
    /// The transport failed.
    Transport(io::ErrorKind),
    /// A local defect (misused packet or full queue).
    Local,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Violation(violation) => write!(f, "protocol error: {violation}"),
            Self::PeerClosed => write!(f, "closed by peer"),
            Self::Transport(kind) => write!(f, "transport error: {kind}"),
            Self::Local => write!(f, "local error"),
        }
    }
}

impl From<&ChannelError> for CloseReason {
    fn from(err: &ChannelError) -> Self {
        match err {
            ChannelError::PeerClosed => Self::PeerClosed,
            ChannelError::Framing(framing) => Self::Violation(ProtocolViolation::Framing(*framing)),
            ChannelError::Transfer(TransferError::Transport(io)) => Self::Transport(io.kind()),
            ChannelError::Transfer(_) | ChannelError::QueueFull { .. } | ChannelError::Packet(_) => {
                Self::Local
            }
        }
    }
}

/// State kept per registered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    label: String,
    close_reason: Option<CloseReason>,
}

impl ConnectionContext {
    /// Human-readable name given at registration (typically the peer address).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The first reason recorded for closing this connection.
    #[must_use]
    pub const fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    #[must_use]
    pub const fn is_closing(&self) -> bool {
        self.close_reason.is_some()
    }
}

/// Owns the context of every live connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    contexts: HashMap<ConnectionId, ConnectionContext>,
    next_id: u32,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns its id.
    pub fn register(&mut self, label: impl Into<String>) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let label = label.into();
        debug!(%id, %label, "registered connection");
        self.contexts.insert(
            id,
            ConnectionContext {
                label,
                close_reason: None,
            },
        );
        id
    }

    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionContext> {
        self.contexts.get(&id)
    }

    /// Marks a connection for closing. The first reason wins.
    ///
    /// Returns `false` if the id is unknown.
    pub fn close(&mut self, id: ConnectionId, reason: CloseReason) -> bool {
        let Some(context) = self.contexts.get_mut(&id) else {
            return false;
        };
        if context.close_reason.is_none() {
            info!(%id, label = %context.label, %reason, "closing connection");
            context.close_reason = Some(reason);
        }
        true
    }

    /// Picks up the close signal a decoded packet may carry.
    ///
    /// Returns `true` if the packet's connection was marked for closing.
    pub fn absorb(&mut self, packet: &Packet) -> bool {
        match (packet.connection(), packet.violation()) {
            (Some(id), Some(violation)) => self.close(id, CloseReason::Violation(violation)),
            _ => false,
        }
    }

    /// Marks a connection for closing because its channel failed.
    pub fn close_on_error(&mut self, id: ConnectionId, err: &ChannelError) -> bool {
        self.close(id, CloseReason::from(err))
    }

    /// Connections marked for closing, ordered by id.
    #[must_use]
    pub fn closing(&self) -> Vec<(ConnectionId, CloseReason)> {
        let mut closing: Vec<_> = self
            .contexts
            .iter()
            .filter_map(|(id, context)| context.close_reason.map(|reason| (*id, reason)))
            .collect();
        closing.sort_by_key(|(id, _)| *id);
        closing
    }

    /// Drops a connection's context.
    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionContext> {
        self.contexts.remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
