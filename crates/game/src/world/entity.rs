use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::health::{HealthComponent, HealthConfig};
use crate::net::{FieldPatch, FieldValue, QuantizedPosition};
use crate::replication::Replicated;
use crate::weapon::{SpreadModel, WeaponConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Weapons share the entity id space.
pub type WeaponId = EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    /// The authoritative process itself.
    pub const HOST: Self = Self(0);

    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_host() {
            write!(f, "host")
        } else {
            write!(f, "peer {}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    Combatant = 0,
    Weapon = 1,
}

impl EntityKind {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Combatant),
            1 => Some(Self::Weapon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward: forward.try_normalize().unwrap_or(Vec3::NEG_Z),
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Maps `offset` (x right, y up, z forward) into world space.
    pub fn local_to_world(&self, offset: Vec3) -> Vec3 {
        let right = self
            .forward
            .cross(Vec3::Y)
            .try_normalize()
            .unwrap_or(Vec3::X);
        let up = right.cross(self.forward);
        self.position + right * offset.x + up * offset.y + self.forward * offset.z
    }

    pub fn to_field(&self) -> FieldValue {
        FieldValue::Transform {
            position: self.position.to_array(),
            forward: FieldValue::encode_forward(self.forward.to_array()),
        }
    }

    pub fn from_wire(position: [f32; 3], forward: [i16; 3]) -> Self {
        Self::new(
            Vec3::from_array(position),
            Vec3::from_array(FieldValue::decode_forward(forward)),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatantShape {
    pub half_height: f32,
    pub radius: f32,
}

impl Default for CombatantShape {
    fn default() -> Self {
        Self {
            half_height: 0.9,
            radius: 0.4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: EntityId,
    pub controller: PeerId,
    pub shape: CombatantShape,
    pub(crate) transform: Replicated<Transform>,
    pub(crate) health: HealthComponent,
    pub(crate) bound_weapon: Replicated<Option<WeaponId>>,
}

impl Combatant {
    pub(crate) fn new(
        id: EntityId,
        controller: PeerId,
        transform: Transform,
        shape: CombatantShape,
        health: &HealthConfig,
    ) -> Self {
        Self {
            id,
            controller,
            shape,
            transform: Replicated::new(transform),
            health: HealthComponent::new(health),
            bound_weapon: Replicated::new(None),
        }
    }

    pub fn transform(&self) -> Transform {
        *self.transform.get()
    }

    pub fn position(&self) -> Vec3 {
        self.transform.get().position
    }

    pub fn forward(&self) -> Vec3 {
        self.transform.get().forward
    }

    pub fn health(&self) -> &HealthComponent {
        &self.health
    }

    pub fn bound_weapon(&self) -> Option<WeaponId> {
        *self.bound_weapon.get()
    }

    /// Where a dropped weapon lands.
    pub fn drop_point(&self) -> Vec3 {
        self.position() - Vec3::new(0.0, self.shape.half_height, 0.0)
    }

    pub(crate) fn replicated_fields(&self) -> Vec<FieldPatch> {
        vec![
            FieldPatch {
                version: self.transform.version(),
                value: self.transform.get().to_field(),
            },
            FieldPatch {
                version: self.health.field().version(),
                value: FieldValue::Health(self.health.current()),
            },
            FieldPatch {
                version: self.bound_weapon.version(),
                value: FieldValue::BoundWeapon(self.bound_weapon().map(EntityId::id)),
            },
        ]
    }
}

/// Per-participant firing state. Never replicated: each side advances it
/// from the shots it sees locally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponState {
    pub spread: f32,
    pub last_fire: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Weapon {
    pub id: WeaponId,
    pub config: WeaponConfig,
    pub(crate) spread: SpreadModel,
    pub(crate) state: WeaponState,
    pub(crate) transform: Replicated<Transform>,
    pub(crate) owner: Replicated<Option<EntityId>>,
    pub(crate) hit_outcome: Replicated<Option<QuantizedPosition>>,
}

impl Weapon {
    pub(crate) fn new(id: WeaponId, config: WeaponConfig, transform: Transform) -> Self {
        let config = config.sanitized();
        let spread = SpreadModel::new(config.spread);
        Self {
            id,
            state: WeaponState {
                spread: spread.floor(),
                last_fire: None,
            },
            spread,
            config,
            transform: Replicated::new(transform),
            owner: Replicated::new(None),
            hit_outcome: Replicated::new(None),
        }
    }

    pub fn transform(&self) -> Transform {
        *self.transform.get()
    }

    pub fn owner(&self) -> Option<EntityId> {
        *self.owner.get()
    }

    pub fn state(&self) -> WeaponState {
        self.state
    }

    pub fn muzzle(&self) -> Vec3 {
        let transform = self.transform.get();
        transform.position + transform.forward * self.config.muzzle_offset
    }

    pub fn trail_end(&self) -> Option<Vec3> {
        self.hit_outcome
            .get()
            .map(|quantized| Vec3::from_array(quantized.decode()))
    }

    pub fn hit_outcome_version(&self) -> u32 {
        self.hit_outcome.version()
    }

    /// Advances spread and the last-fire stamp for a shot at `now`, returning
    /// the spread that shot uses.
    pub(crate) fn advance_spread(&mut self, now: f64) -> f32 {
        let elapsed = self.state.last_fire.map(|last| (now - last) as f32);
        self.state.spread = self.spread.update(self.state.spread, elapsed);
        self.state.last_fire = Some(now);
        self.state.spread
    }

    pub(crate) fn replicated_fields(&self) -> Vec<FieldPatch> {
        let mut fields = vec![
            FieldPatch {
                version: self.transform.version(),
                value: self.transform.get().to_field(),
            },
            FieldPatch {
                version: self.owner.version(),
                value: FieldValue::Owner(self.owner().map(EntityId::id)),
            },
        ];
        if let Some(trail_end) = *self.hit_outcome.get() {
            fields.push(FieldPatch {
                version: self.hit_outcome.version(),
                value: FieldValue::HitOutcome { trail_end },
            });
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_survives_wire_encoding() {
        let transform = Transform::new(Vec3::new(3.0, 1.5, -7.25), Vec3::new(1.0, 0.0, 1.0));
        let FieldValue::Transform { position, forward } = transform.to_field() else {
            panic!("Expected Transform");
        };

        let decoded = Transform::from_wire(position, forward);
        assert_eq!(decoded.position, transform.position);
        assert!((decoded.forward - transform.forward).length() < 1e-3);
    }

    #[test]
    fn local_offset_follows_facing() {
        let transform = Transform::new(Vec3::ZERO, Vec3::X);
        let socket = transform.local_to_world(Vec3::new(0.0, 0.5, 1.0));
        assert!((socket - Vec3::new(1.0, 0.5, 0.0)).length() < 1e-5);
    }

    #[test]
    fn spread_advances_per_shot() {
        let mut weapon = Weapon::new(EntityId(1), WeaponConfig::default(), Transform::default());

        assert_eq!(weapon.advance_spread(1.0), 0.05);
        let second = weapon.advance_spread(1.1);
        assert!(second > 0.05);
        assert_eq!(weapon.state().last_fire, Some(1.1));
    }

    #[test]
    fn hit_outcome_is_not_replicated_before_the_first_shot() {
        let weapon = Weapon::new(EntityId(1), WeaponConfig::default(), Transform::default());
        assert_eq!(weapon.replicated_fields().len(), 2);
    }
}
