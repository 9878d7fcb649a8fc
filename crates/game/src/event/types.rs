use glam::Vec3;

use crate::health::DamageType;
use crate::world::{EntityId, PeerId, WeaponId};

use super::observers::Observers;

/// Health moved on `entity`. Attribution is only known where the damage was
/// resolved; mirrors report `None` for all three.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthChanged {
    pub entity: EntityId,
    pub health: f32,
    pub delta: f32,
    pub damage_type: Option<DamageType>,
    pub instigator: Option<PeerId>,
    pub causer: Option<EntityId>,
}

impl HealthChanged {
    pub fn is_attributed(&self) -> bool {
        self.damage_type.is_some() || self.instigator.is_some() || self.causer.is_some()
    }
}

/// A shot landed. Presentation draws a trail from `muzzle` to `trail_end`,
/// feeding the endpoint to the effect under `trail_parameter`.
#[derive(Debug, Clone, PartialEq)]
pub struct HitResolved {
    pub weapon: WeaponId,
    pub muzzle: Vec3,
    pub trail_end: Vec3,
    pub trail_parameter: String,
}

#[derive(Debug, Default)]
pub struct Notifications {
    pub health_changed: Observers<HealthChanged>,
    pub hit_resolved: Observers<HitResolved>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }
}
