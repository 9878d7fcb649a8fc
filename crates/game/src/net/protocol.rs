use rkyv::{rancor, Archive, Deserialize, Serialize};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x48495453;
pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Centimeter grid used for replicated trail endpoints.
pub const POSITION_QUANTUM: f32 = 0.01;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl PacketHeader {
    pub fn new(sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            ack,
            ack_bitfield,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[inline]
pub fn sequence_lte(a: u32, b: u32) -> bool {
    b.wrapping_sub(a) < SEQUENCE_WRAP_THRESHOLD
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    /// `session` is drawn fresh on every connect. The same value again is a
    /// retry after a lost welcome; a new one from a known address replaces
    /// that address's session.
    Join { session: u64 },
    Welcome { session: u64, peer_id: u32, entity_id: u32 },
    Denied { reason: String },
    Actions(ActionBatch),
    Replication(ReplicationUpdate),
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ActionKind {
    Fire { weapon_id: u32 },
    Equip,
    Unequip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ForwardedAction {
    pub request_id: u32,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ActionBatch {
    pub actions: Vec<ForwardedAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct QuantizedPosition(pub [i32; 3]);

impl QuantizedPosition {
    pub fn encode(position: [f32; 3]) -> Self {
        Self([
            (position[0] / POSITION_QUANTUM).round() as i32,
            (position[1] / POSITION_QUANTUM).round() as i32,
            (position[2] / POSITION_QUANTUM).round() as i32,
        ])
    }

    pub fn decode(&self) -> [f32; 3] {
        [
            self.0[0] as f32 * POSITION_QUANTUM,
            self.0[1] as f32 * POSITION_QUANTUM,
            self.0[2] as f32 * POSITION_QUANTUM,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum FieldValue {
    Transform {
        position: [f32; 3],
        forward: [i16; 3],
    },
    Health(f32),
    BoundWeapon(Option<u32>),
    Owner(Option<u32>),
    HitOutcome {
        trail_end: QuantizedPosition,
    },
}

impl FieldValue {
    pub fn encode_forward(forward: [f32; 3]) -> [i16; 3] {
        [
            (forward[0].clamp(-1.0, 1.0) * 32767.0) as i16,
            (forward[1].clamp(-1.0, 1.0) * 32767.0) as i16,
            (forward[2].clamp(-1.0, 1.0) * 32767.0) as i16,
        ]
    }

    pub fn decode_forward(forward: [i16; 3]) -> [f32; 3] {
        [
            forward[0] as f32 / 32767.0,
            forward[1] as f32 / 32767.0,
            forward[2] as f32 / 32767.0,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct FieldPatch {
    pub version: u32,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntityDelta {
    pub net_id: u32,
    pub kind: u8,
    pub patches: Vec<FieldPatch>,
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ReplicationUpdate {
    pub tick: u32,
    pub action_ack: u32,
    pub entities: Vec<EntityDelta>,
    pub removed: Vec<u32>,
}

impl ReplicationUpdate {
    pub fn new(tick: u32, action_ack: u32) -> Self {
        Self {
            tick,
            action_ack,
            entities: Vec::new(),
            removed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}
