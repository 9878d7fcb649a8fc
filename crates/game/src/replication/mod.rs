mod channel;
mod field;
mod mirror;

pub use channel::{ReplicationChannel, MAX_ENTITIES_PER_PACKET, MAX_REMOVALS_PER_PACKET};
pub use field::{FieldMask, Replicated};
