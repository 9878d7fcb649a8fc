use glam::Vec3;

use crate::error::ActionError;
use crate::event::{HealthChanged, HitResolved, Notifications};
use crate::health::{HealthComponent, HealthConfig};
use crate::net::{EntityDelta, FieldValue, ReplicationUpdate};
use crate::weapon::WeaponConfig;
use crate::world::{
    Combatant, CombatantShape, EntityId, EntityKind, PeerId, Role, Transform, Weapon, World,
};

use super::field::Replicated;

impl World {
    /// Applies one replication update to a mirror. Known entities take every
    /// field whose version is newer and notify; entities seen for the first
    /// time are populated silently. Returns the number of fields applied.
    pub fn apply_replication(
        &mut self,
        update: &ReplicationUpdate,
        weapon_defaults: &WeaponConfig,
        notifications: &mut Notifications,
    ) -> Result<usize, ActionError> {
        self.require(Role::Observer, "apply_replication")?;

        let mut applied = 0;
        for delta in &update.entities {
            let id = EntityId(delta.net_id);
            if self.tombstones.contains(&id) {
                continue;
            }
            let Some(kind) = EntityKind::from_wire(delta.kind) else {
                log::debug!("ignoring delta for {} with unknown kind {}", id, delta.kind);
                continue;
            };

            applied += match kind {
                EntityKind::Combatant if self.combatants.contains_key(&id) => {
                    self.apply_combatant(id, delta, notifications)
                }
                EntityKind::Weapon if self.weapons.contains_key(&id) => {
                    self.apply_weapon(id, delta, notifications)
                }
                EntityKind::Combatant => {
                    self.combatants.insert(id, mirror_combatant(id, delta));
                    delta.patches.len()
                }
                EntityKind::Weapon => {
                    self.weapons
                        .insert(id, mirror_weapon(id, delta, weapon_defaults));
                    delta.patches.len()
                }
            };
        }

        for &removed in &update.removed {
            let id = EntityId(removed);
            if self.tombstones.insert(id) {
                self.combatants.remove(&id);
                self.weapons.remove(&id);
            }
        }

        Ok(applied)
    }

    fn apply_combatant(
        &mut self,
        id: EntityId,
        delta: &EntityDelta,
        notifications: &mut Notifications,
    ) -> usize {
        let Some(combatant) = self.combatants.get_mut(&id) else {
            return 0;
        };

        let mut applied = 0;
        for patch in &delta.patches {
            let changed = match patch.value {
                FieldValue::Transform { position, forward } => combatant
                    .transform
                    .apply(Transform::from_wire(position, forward), patch.version)
                    .is_some(),
                FieldValue::Health(value) => {
                    match combatant.health.apply_replicated(value, patch.version) {
                        Some(change) => {
                            notifications.health_changed.notify(&HealthChanged {
                                entity: id,
                                health: change.new,
                                delta: change.delta(),
                                damage_type: None,
                                instigator: None,
                                causer: None,
                            });
                            true
                        }
                        None => false,
                    }
                }
                FieldValue::BoundWeapon(weapon) => combatant
                    .bound_weapon
                    .apply(weapon.map(EntityId), patch.version)
                    .is_some(),
                _ => false,
            };
            applied += changed as usize;
        }
        applied
    }

    fn apply_weapon(
        &mut self,
        id: EntityId,
        delta: &EntityDelta,
        notifications: &mut Notifications,
    ) -> usize {
        let Some(weapon) = self.weapons.get_mut(&id) else {
            return 0;
        };

        let mut applied = 0;
        for patch in &delta.patches {
            let changed = match patch.value {
                FieldValue::Transform { position, forward } => weapon
                    .transform
                    .apply(Transform::from_wire(position, forward), patch.version)
                    .is_some(),
                FieldValue::Owner(owner) => weapon
                    .owner
                    .apply(owner.map(EntityId), patch.version)
                    .is_some(),
                FieldValue::HitOutcome { trail_end } => {
                    let fresh = weapon
                        .hit_outcome
                        .apply(Some(trail_end), patch.version)
                        .is_some();
                    if fresh {
                        notifications.hit_resolved.notify(&HitResolved {
                            weapon: id,
                            muzzle: weapon.muzzle(),
                            trail_end: Vec3::from_array(trail_end.decode()),
                            trail_parameter: weapon.config.trail_parameter.clone(),
                        });
                    }
                    fresh
                }
                _ => false,
            };
            applied += changed as usize;
        }
        applied
    }
}

fn mirror_combatant(id: EntityId, delta: &EntityDelta) -> Combatant {
    // Fields absent from the first delta start at version 0 so whatever
    // arrives later wins.
    let mut combatant = Combatant::new(
        id,
        PeerId::HOST,
        Transform::default(),
        CombatantShape::default(),
        &HealthConfig::default(),
    );
    combatant.transform = Replicated::received(Transform::default(), 0);
    combatant.bound_weapon = Replicated::received(None, 0);
    combatant.health = HealthComponent::mirrored(0.0, 0);

    for patch in &delta.patches {
        match patch.value {
            FieldValue::Transform { position, forward } => {
                combatant.transform =
                    Replicated::received(Transform::from_wire(position, forward), patch.version);
            }
            FieldValue::Health(value) => {
                combatant.health = HealthComponent::mirrored(value, patch.version);
            }
            FieldValue::BoundWeapon(weapon) => {
                combatant.bound_weapon = Replicated::received(weapon.map(EntityId), patch.version);
            }
            _ => {}
        }
    }
    combatant
}

fn mirror_weapon(id: EntityId, delta: &EntityDelta, defaults: &WeaponConfig) -> Weapon {
    let mut weapon = Weapon::new(id, defaults.clone(), Transform::default());
    weapon.transform = Replicated::received(Transform::default(), 0);
    weapon.owner = Replicated::received(None, 0);
    weapon.hit_outcome = Replicated::received(None, 0);

    for patch in &delta.patches {
        match patch.value {
            FieldValue::Transform { position, forward } => {
                weapon.transform =
                    Replicated::received(Transform::from_wire(position, forward), patch.version);
            }
            FieldValue::Owner(owner) => {
                weapon.owner = Replicated::received(owner.map(EntityId), patch.version);
            }
            FieldValue::HitOutcome { trail_end } => {
                weapon.hit_outcome = Replicated::received(Some(trail_end), patch.version);
            }
            _ => {}
        }
    }
    weapon
}
