use std::io;

use crate::net::PacketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("no weapon bound")]
    NoWeaponBound,
    #[error("weapon has no wielder")]
    NoWielder,
    #[error("no weapon in pickup range")]
    NothingToEquip,
    #[error("target is dead")]
    TargetDead,
    #[error("unknown entity {0}")]
    UnknownEntity(u32),
    #[error("unknown weapon {0}")]
    UnknownWeapon(u32),
    #[error("peer does not control the wielder")]
    NotController,
    #[error("weapon already owned")]
    AlreadyOwned,
}

/// Failures of a gameplay action. Only `RoleViolation` indicates a bug in the
/// caller; the rest are dropped silently by the sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("precondition not met: {0}")]
    PreconditionNotMet(#[from] Precondition),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("authoritative-only operation invoked without authority")]
    RoleViolation,
}

impl ActionError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::RoleViolation)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("packet of {0} bytes exceeds MTU")]
    PacketTooLarge(usize),
    #[error("no remote address set")]
    NotConnected,
}
