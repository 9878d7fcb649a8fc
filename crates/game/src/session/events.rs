use std::net::SocketAddr;

use crate::world::{EntityId, PeerId};

/// Session lifecycle events, drained by the embedding binary.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PeerJoined {
        peer: PeerId,
        addr: SocketAddr,
        entity: EntityId,
    },
    PeerLeft {
        peer: PeerId,
        reason: LeaveReason,
    },
    JoinDenied {
        addr: SocketAddr,
        reason: String,
    },
    Welcomed {
        peer: PeerId,
        entity: EntityId,
    },
    Disconnected {
        reason: LeaveReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    Graceful,
    Timeout,
    Kicked,
    /// The same address joined again under a new session.
    Rejoined,
}

impl LeaveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::Graceful => "disconnected",
            LeaveReason::Timeout => "timed out",
            LeaveReason::Kicked => "kicked",
            LeaveReason::Rejoined => "rejoined",
        }
    }
}
