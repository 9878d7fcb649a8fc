use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

use crate::link::ActionInbox;
use crate::net::{AckTracker, PacketHeader, ReceiveTracker};
use crate::replication::ReplicationChannel;
use crate::world::{EntityId, PeerId};

const MAX_UNACKED_PACKETS: usize = 64;

/// Host-side state of one joined observer.
#[derive(Debug)]
pub struct PeerConnection {
    pub addr: SocketAddr,
    pub peer: PeerId,
    /// Identifies the observer process run this connection belongs to.
    pub session: u64,
    pub combatant: Option<EntityId>,
    pub last_receive: f64,
    pub replication: ReplicationChannel,
    pub ack_tracker: AckTracker,
    pub receive_tracker: ReceiveTracker,
    pub inbox: ActionInbox,
    send_sequence: u32,
}

impl PeerConnection {
    pub fn new(addr: SocketAddr, peer: PeerId, session: u64, now: f64) -> Self {
        Self {
            addr,
            peer,
            session,
            combatant: None,
            last_receive: now,
            replication: ReplicationChannel::new(),
            ack_tracker: AckTracker::new(MAX_UNACKED_PACKETS),
            receive_tracker: ReceiveTracker::new(),
            inbox: ActionInbox::new(),
            send_sequence: 0,
        }
    }

    pub fn is_timed_out(&self, now: f64, timeout: f64) -> bool {
        now - self.last_receive > timeout
    }

    pub fn touch(&mut self, now: f64) {
        self.last_receive = now;
    }

    /// Header for the next tracked packet to this peer, carrying its acks.
    pub fn next_header(&mut self) -> PacketHeader {
        self.send_sequence = self.send_sequence.wrapping_add(1).max(1);
        let (ack, ack_bitfield) = self.receive_tracker.ack_data();
        PacketHeader::new(self.send_sequence, ack, ack_bitfield)
    }

    /// Records a sent replication packet; a packet pushed out of the ack
    /// window without an ack is treated as lost.
    pub fn track_sent(&mut self, sequence: u32, now: f64) {
        if let Some(lost) = self.ack_tracker.track_packet(sequence, now) {
            self.replication.on_lost(lost);
        }
    }

    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32, now: f64) {
        for sequence in self.ack_tracker.process_ack(ack, ack_bitfield, now) {
            self.replication.on_acked(sequence);
        }
    }
}

#[derive(Debug)]
pub struct PeerTable {
    by_addr: HashMap<SocketAddr, PeerId>,
    peers: BTreeMap<PeerId, PeerConnection>,
    next_peer: u32,
    max_peers: usize,
}

impl PeerTable {
    pub fn new(max_peers: usize) -> Self {
        Self {
            by_addr: HashMap::new(),
            peers: BTreeMap::new(),
            // 0 is the host itself.
            next_peer: 1,
            max_peers,
        }
    }

    /// Existing peer for `addr`, or a newly admitted one. `None` when full.
    /// Callers remove a [`stale_session`](Self::stale_session) first.
    pub fn admit(&mut self, addr: SocketAddr, session: u64, now: f64) -> Option<(PeerId, bool)> {
        if let Some(&peer) = self.by_addr.get(&addr) {
            return Some((peer, false));
        }
        if self.peers.len() >= self.max_peers {
            return None;
        }

        let peer = PeerId(self.next_peer);
        self.next_peer += 1;
        self.peers
            .insert(peer, PeerConnection::new(addr, peer, session, now));
        self.by_addr.insert(addr, peer);
        Some((peer, true))
    }

    /// The peer on `addr` if it was admitted under a different session.
    pub fn stale_session(&self, addr: &SocketAddr, session: u64) -> Option<PeerId> {
        let peer = self.by_addr.get(addr)?;
        self.peers
            .get(peer)
            .filter(|c| c.session != session)
            .map(|c| c.peer)
    }

    pub fn id_of(&self, addr: &SocketAddr) -> Option<PeerId> {
        self.by_addr.get(addr).copied()
    }

    pub fn get(&self, peer: PeerId) -> Option<&PeerConnection> {
        self.peers.get(&peer)
    }

    pub fn get_mut(&mut self, peer: PeerId) -> Option<&mut PeerConnection> {
        self.peers.get_mut(&peer)
    }

    pub fn get_by_addr_mut(&mut self, addr: &SocketAddr) -> Option<&mut PeerConnection> {
        let peer = self.by_addr.get(addr)?;
        self.peers.get_mut(peer)
    }

    pub fn remove(&mut self, peer: PeerId) -> Option<PeerConnection> {
        let connection = self.peers.remove(&peer)?;
        self.by_addr.remove(&connection.addr);
        Some(connection)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerConnection> {
        self.peers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerConnection> {
        self.peers.values_mut()
    }

    pub fn timed_out(&self, now: f64, timeout: f64) -> Vec<PeerId> {
        self.peers
            .values()
            .filter(|c| c.is_timed_out(now, timeout))
            .map(|c| c.peer)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
