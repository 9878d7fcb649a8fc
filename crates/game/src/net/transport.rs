use std::net::SocketAddr;

use crate::error::NetError;

use super::protocol::Packet;
use super::stats::NetworkStats;

/// Datagram-style transport. Sends never block; `receive` drains whatever has
/// arrived since the last call.
pub trait Transport {
    fn local_addr(&self) -> SocketAddr;

    fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> Result<usize, NetError>;

    fn receive(&mut self) -> Result<Vec<(Packet, SocketAddr)>, NetError>;

    fn stats(&self) -> &NetworkStats;
}
