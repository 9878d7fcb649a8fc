use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::error::NetError;

use super::protocol::{MAX_PACKET_SIZE, Packet};
use super::stats::NetworkStats;
use super::transport::Transport;

pub struct UdpEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_PACKET_SIZE],
}

impl UdpEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_PACKET_SIZE],
        })
    }
}

impl Transport for UdpEndpoint {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> Result<usize, NetError> {
        let data = packet.serialize()?;

        if data.len() > MAX_PACKET_SIZE {
            return Err(NetError::PacketTooLarge(data.len()));
        }

        let bytes = self.socket.send_to(&data, addr)?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes as u64;

        Ok(bytes)
    }

    fn receive(&mut self) -> Result<Vec<(Packet, SocketAddr)>, NetError> {
        let mut packets = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    if size < 8 {
                        continue;
                    }

                    match Packet::deserialize(&self.recv_buffer[..size]) {
                        Ok(packet) if packet.header.is_valid() => {
                            self.stats.packets_received += 1;
                            self.stats.bytes_received += size as u64;
                            packets.push((packet, addr));
                        }
                        Ok(_) => {}
                        Err(e) => log::debug!("dropping malformed datagram from {}: {}", addr, e),
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // Windows reports ICMP port-unreachable on the next recv.
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(packets)
    }

    fn stats(&self) -> &NetworkStats {
        &self.stats
    }
}
