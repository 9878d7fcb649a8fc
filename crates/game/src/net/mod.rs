mod endpoint;
mod loopback;
mod protocol;
mod stats;
mod tracking;
mod transport;

pub use endpoint::UdpEndpoint;
pub use loopback::{LoopbackEndpoint, LoopbackHub};
pub use protocol::{sequence_greater_than, sequence_lte, ArchivedPacket};
pub use protocol::{
    ActionBatch, ActionKind, EntityDelta, FieldPatch, FieldValue, ForwardedAction, Packet,
    PacketError, PacketHeader, PacketType, QuantizedPosition, ReplicationUpdate, DEFAULT_PORT,
    DEFAULT_TICK_RATE, MAX_PACKET_SIZE, POSITION_QUANTUM, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use stats::{NetworkStats, PacketLossSimulation};
pub use tracking::{AckTracker, PendingPacket, ReceiveTracker};
pub use transport::Transport;
