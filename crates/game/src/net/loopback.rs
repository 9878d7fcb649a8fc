use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::NetError;

use super::protocol::{MAX_PACKET_SIZE, Packet};
use super::stats::{NetworkStats, PacketLossSimulation};
use super::transport::Transport;

#[derive(Debug)]
struct DelayedPacket {
    release_ms: u64,
    order: u64,
    bytes: Vec<u8>,
    from: SocketAddr,
}

impl PartialEq for DelayedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.release_ms == other.release_ms && self.order == other.order
    }
}

impl Eq for DelayedPacket {}

impl PartialOrd for DelayedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_ms
            .cmp(&self.release_ms)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug)]
struct HubState {
    now_ms: u64,
    next_order: u64,
    inboxes: HashMap<SocketAddr, BinaryHeap<DelayedPacket>>,
    links: HashMap<(SocketAddr, SocketAddr), PacketLossSimulation>,
    rng: ChaCha8Rng,
}

/// In-process network with a manually advanced clock. Every endpoint created
/// from the same hub can reach every other one; per-link loss and latency
/// follow [`PacketLossSimulation`].
#[derive(Debug, Clone)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                now_ms: 0,
                next_order: 0,
                inboxes: HashMap::new(),
                links: HashMap::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // A panicking test thread must not wedge every other endpoint.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn endpoint(&self, addr: SocketAddr) -> LoopbackEndpoint {
        self.lock().inboxes.entry(addr).or_default();
        LoopbackEndpoint {
            hub: self.clone(),
            addr,
            stats: NetworkStats::default(),
        }
    }

    pub fn set_link(&self, from: SocketAddr, to: SocketAddr, sim: PacketLossSimulation) {
        let mut state = self.lock();
        if sim.enabled {
            state.links.insert((from, to), sim);
        } else {
            state.links.remove(&(from, to));
        }
    }

    pub fn set_duplex(&self, a: SocketAddr, b: SocketAddr, sim: PacketLossSimulation) {
        self.set_link(a, b, sim.clone());
        self.set_link(b, a, sim);
    }

    pub fn advance(&self, ms: u64) {
        let mut state = self.lock();
        state.now_ms += ms;
    }

    pub fn now_ms(&self) -> u64 {
        self.lock().now_ms
    }

    pub fn in_flight(&self) -> usize {
        self.lock().inboxes.values().map(BinaryHeap::len).sum()
    }
}

pub struct LoopbackEndpoint {
    hub: LoopbackHub,
    addr: SocketAddr,
    stats: NetworkStats,
}

impl Transport for LoopbackEndpoint {
    fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> Result<usize, NetError> {
        let bytes = packet.serialize()?;
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(NetError::PacketTooLarge(bytes.len()));
        }
        let size = bytes.len();

        let mut guard = self.hub.lock();
        let state = &mut *guard;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += size as u64;

        let (dropped, delay) = match state.links.get(&(self.addr, addr)) {
            Some(sim) => (sim.should_drop(&mut state.rng), sim.delay_ms(&mut state.rng)),
            None => (false, 0),
        };

        let Some(inbox) = state.inboxes.get_mut(&addr) else {
            // Nobody listening: datagram vanishes, like UDP.
            return Ok(size);
        };

        if dropped {
            self.stats.packets_dropped += 1;
            return Ok(size);
        }

        let order = state.next_order;
        state.next_order += 1;
        inbox.push(DelayedPacket {
            release_ms: state.now_ms + delay as u64,
            order,
            bytes,
            from: self.addr,
        });

        Ok(size)
    }

    fn receive(&mut self) -> Result<Vec<(Packet, SocketAddr)>, NetError> {
        let mut ready = Vec::new();
        {
            let mut guard = self.hub.lock();
            let state = &mut *guard;
            let now = state.now_ms;
            if let Some(inbox) = state.inboxes.get_mut(&self.addr) {
                while inbox.peek().is_some_and(|p| p.release_ms <= now) {
                    if let Some(delayed) = inbox.pop() {
                        ready.push(delayed);
                    }
                }
            }
        }

        let mut packets = Vec::with_capacity(ready.len());
        for delayed in ready {
            let packet = Packet::deserialize(&delayed.bytes)?;
            if !packet.header.is_valid() {
                continue;
            }
            self.stats.packets_received += 1;
            self.stats.bytes_received += delayed.bytes.len() as u64;
            packets.push((packet, delayed.from));
        }

        Ok(packets)
    }

    fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}
