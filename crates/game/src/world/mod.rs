mod entity;

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;

use crate::error::{ActionError, Precondition};
use crate::event::HealthChanged;
use crate::health::{DamageEvent, HealthConfig};
use crate::net::QuantizedPosition;
use crate::weapon::WeaponConfig;

pub use entity::{
    Combatant, CombatantShape, EntityId, EntityKind, PeerId, Transform, Weapon, WeaponId,
    WeaponState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns every replicated field.
    Authority,
    /// Mirrors what the authority replicates.
    Observer,
}

/// Every combatant and weapon known to one process. Replicated fields only
/// change through the role-checked methods here (authority) or the
/// replication apply step (observer).
#[derive(Debug)]
pub struct World {
    role: Role,
    next_id: u32,
    pub(crate) combatants: BTreeMap<EntityId, Combatant>,
    pub(crate) weapons: BTreeMap<WeaponId, Weapon>,
    removed: Vec<EntityId>,
    /// Mirror only: ids the authority removed, so late packets cannot
    /// resurrect them.
    pub(crate) tombstones: BTreeSet<EntityId>,
}

impl World {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            next_id: 1,
            combatants: BTreeMap::new(),
            weapons: BTreeMap::new(),
            removed: Vec::new(),
            tombstones: BTreeSet::new(),
        }
    }

    pub fn authority() -> Self {
        Self::new(Role::Authority)
    }

    pub fn observer() -> Self {
        Self::new(Role::Observer)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    pub(crate) fn require(&self, role: Role, operation: &'static str) -> Result<(), ActionError> {
        if self.role == role {
            return Ok(());
        }
        log::error!(
            "{} requires {:?} role but this world is {:?}",
            operation,
            role,
            self.role
        );
        Err(ActionError::RoleViolation)
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn spawn_combatant(
        &mut self,
        controller: PeerId,
        transform: Transform,
        shape: CombatantShape,
        health: &HealthConfig,
    ) -> Result<EntityId, ActionError> {
        self.require(Role::Authority, "spawn_combatant")?;
        let id = self.allocate_id();
        self.combatants
            .insert(id, Combatant::new(id, controller, transform, shape, health));
        Ok(id)
    }

    pub fn spawn_weapon(
        &mut self,
        config: WeaponConfig,
        transform: Transform,
    ) -> Result<WeaponId, ActionError> {
        self.require(Role::Authority, "spawn_weapon")?;
        let id = self.allocate_id();
        self.weapons.insert(id, Weapon::new(id, config, transform));
        Ok(id)
    }

    /// Removes the entity, dropping anything it wields or freeing its
    /// wielder first.
    pub fn despawn(&mut self, id: EntityId) -> Result<(), ActionError> {
        self.require(Role::Authority, "despawn")?;

        if let Some(combatant) = self.combatants.get(&id) {
            if combatant.bound_weapon().is_some() {
                self.unbind_weapon(id)?;
            }
            self.combatants.remove(&id);
        } else if let Some(weapon) = self.weapons.get(&id) {
            if let Some(wielder) = weapon.owner() {
                self.unbind_weapon(wielder)?;
            }
            self.weapons.remove(&id);
        } else {
            return Err(Precondition::UnknownEntity(id.0).into());
        }

        self.removed.push(id);
        Ok(())
    }

    /// Entities despawned since the last call.
    pub fn take_removals(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.removed)
    }

    pub fn set_transform(&mut self, id: EntityId, transform: Transform) -> Result<bool, ActionError> {
        self.require(Role::Authority, "set_transform")?;

        if let Some(combatant) = self.combatants.get_mut(&id) {
            return Ok(combatant.transform.set(transform));
        }
        if let Some(weapon) = self.weapons.get_mut(&id) {
            return Ok(weapon.transform.set(transform));
        }
        Err(Precondition::UnknownEntity(id.0).into())
    }

    pub fn reset_health(&mut self, id: EntityId) -> Result<bool, ActionError> {
        self.require(Role::Authority, "reset_health")?;
        let combatant = self
            .combatants
            .get_mut(&id)
            .ok_or(Precondition::UnknownEntity(id.0))?;
        Ok(combatant.health.reset())
    }

    pub fn apply_damage(
        &mut self,
        target: EntityId,
        event: &DamageEvent,
    ) -> Result<HealthChanged, ActionError> {
        self.require(Role::Authority, "apply_damage")?;
        let combatant = self
            .combatants
            .get_mut(&target)
            .ok_or(Precondition::UnknownEntity(target.0))?;

        let delta = combatant.health.apply_damage(event)?;
        if combatant.health.is_dead() {
            log::info!("{} died", target);
        }

        Ok(HealthChanged {
            entity: target,
            health: delta.new,
            delta: delta.delta(),
            damage_type: Some(event.damage_type),
            instigator: event.instigator,
            causer: event.causer,
        })
    }

    /// Gives `weapon` to `combatant` and snaps it to the wielder.
    pub fn bind_weapon(&mut self, combatant: EntityId, weapon: WeaponId) -> Result<(), ActionError> {
        self.require(Role::Authority, "bind_weapon")?;

        let wielder = self
            .combatants
            .get(&combatant)
            .ok_or(Precondition::UnknownEntity(combatant.0))?;
        if wielder.bound_weapon().is_some() {
            return Err(Precondition::AlreadyOwned.into());
        }
        let wielder_transform = wielder.transform();

        let item = self
            .weapons
            .get_mut(&weapon)
            .ok_or(Precondition::UnknownWeapon(weapon.0))?;
        if item.owner().is_some() {
            return Err(Precondition::AlreadyOwned.into());
        }
        item.owner.set(Some(combatant));
        item.transform.set(wielder_transform);

        if let Some(wielder) = self.combatants.get_mut(&combatant) {
            wielder.bound_weapon.set(Some(weapon));
        }
        Ok(())
    }

    /// Clears both references and leaves the weapon at the wielder's feet.
    pub fn unbind_weapon(&mut self, combatant: EntityId) -> Result<WeaponId, ActionError> {
        self.require(Role::Authority, "unbind_weapon")?;

        let wielder = self
            .combatants
            .get_mut(&combatant)
            .ok_or(Precondition::UnknownEntity(combatant.0))?;
        let weapon = wielder
            .bound_weapon()
            .ok_or(Precondition::NoWeaponBound)?;
        wielder.bound_weapon.set(None);
        let drop = Transform::new(wielder.drop_point(), wielder.forward());

        if let Some(item) = self.weapons.get_mut(&weapon) {
            item.owner.set(None);
            item.transform.set(drop);
        }
        Ok(weapon)
    }

    pub fn record_hit(&mut self, weapon: WeaponId, trail_end: Vec3) -> Result<(), ActionError> {
        self.require(Role::Authority, "record_hit")?;
        let item = self
            .weapons
            .get_mut(&weapon)
            .ok_or(Precondition::UnknownWeapon(weapon.0))?;
        item.hit_outcome
            .force(Some(QuantizedPosition::encode(trail_end.to_array())));
        Ok(())
    }

    /// Moves every wielded weapon onto its wielder's socket.
    pub fn sync_attachments(&mut self, socket_offset: Vec3) -> Result<usize, ActionError> {
        self.require(Role::Authority, "sync_attachments")?;

        let mut moved = 0;
        for weapon in self.weapons.values_mut() {
            let Some(wielder) = weapon.owner().and_then(|id| self.combatants.get(&id)) else {
                continue;
            };
            let wielder = wielder.transform();
            let socket = Transform::new(wielder.local_to_world(socket_offset), wielder.forward);
            if weapon.transform.set(socket) {
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Unowned weapons within `radius` of the combatant, nearest first.
    pub fn overlapping_weapons(&self, combatant: EntityId, radius: f32) -> Vec<WeaponId> {
        let Some(center) = self.combatants.get(&combatant).map(Combatant::position) else {
            return Vec::new();
        };

        let mut candidates: Vec<(f32, WeaponId)> = self
            .weapons
            .values()
            .filter(|weapon| weapon.owner().is_none())
            .map(|weapon| (weapon.transform().position.distance(center), weapon.id))
            .filter(|(distance, _)| *distance <= radius)
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.into_iter().map(|(_, id)| id).collect()
    }

    pub fn combatant(&self, id: EntityId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    pub fn weapon(&self, id: WeaponId) -> Option<&Weapon> {
        self.weapons.get(&id)
    }

    pub(crate) fn weapon_mut(&mut self, id: WeaponId) -> Option<&mut Weapon> {
        self.weapons.get_mut(&id)
    }

    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }

    pub fn weapons(&self) -> impl Iterator<Item = &Weapon> {
        self.weapons.values()
    }

    /// The combatant holding `weapon`, if its owner is known locally.
    pub fn wielder_of(&self, weapon: WeaponId) -> Option<&Combatant> {
        self.weapons
            .get(&weapon)
            .and_then(Weapon::owner)
            .and_then(|owner| self.combatants.get(&owner))
    }

    pub fn entity_count(&self) -> usize {
        self.combatants.len() + self.weapons.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::DamageType;

    fn spawn_fighter(world: &mut World, position: Vec3) -> EntityId {
        world
            .spawn_combatant(
                PeerId::HOST,
                Transform::at(position),
                CombatantShape::default(),
                &HealthConfig::default(),
            )
            .unwrap()
    }

    fn spawn_gun(world: &mut World, position: Vec3) -> WeaponId {
        world
            .spawn_weapon(WeaponConfig::default(), Transform::at(position))
            .unwrap()
    }

    #[test]
    fn observer_world_rejects_authoritative_writes() {
        let mut world = World::observer();

        let spawned = world.spawn_weapon(WeaponConfig::default(), Transform::default());
        assert_eq!(spawned, Err(ActionError::RoleViolation));

        let damage = world.apply_damage(EntityId(1), &DamageEvent::generic(5.0));
        assert_eq!(damage, Err(ActionError::RoleViolation));
        assert!(damage.unwrap_err().is_contract_violation());
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn damage_reports_attribution() {
        let mut world = World::authority();
        let target = spawn_fighter(&mut world, Vec3::ZERO);

        let changed = world
            .apply_damage(
                target,
                &DamageEvent {
                    amount: 20.0,
                    instigator: Some(PeerId(3)),
                    causer: Some(EntityId(9)),
                    damage_type: DamageType::HitScan,
                },
            )
            .unwrap();

        assert_eq!(changed.health, 80.0);
        assert_eq!(changed.delta, -20.0);
        assert_eq!(changed.instigator, Some(PeerId(3)));
        assert_eq!(changed.damage_type, Some(DamageType::HitScan));
    }

    #[test]
    fn bind_then_unbind_drops_below_wielder() {
        let mut world = World::authority();
        let fighter = spawn_fighter(&mut world, Vec3::new(2.0, 1.0, 0.0));
        let gun = spawn_gun(&mut world, Vec3::new(2.5, 0.1, 0.0));

        world.bind_weapon(fighter, gun).unwrap();
        assert_eq!(world.combatant(fighter).unwrap().bound_weapon(), Some(gun));
        assert_eq!(world.weapon(gun).unwrap().owner(), Some(fighter));

        assert_eq!(world.unbind_weapon(fighter), Ok(gun));
        assert_eq!(world.combatant(fighter).unwrap().bound_weapon(), None);
        assert_eq!(world.weapon(gun).unwrap().owner(), None);
        assert_eq!(
            world.weapon(gun).unwrap().transform().position,
            Vec3::new(2.0, 1.0 - 0.9, 0.0)
        );

        assert_eq!(
            world.unbind_weapon(fighter),
            Err(ActionError::PreconditionNotMet(Precondition::NoWeaponBound))
        );
    }

    #[test]
    fn owned_weapon_cannot_be_taken() {
        let mut world = World::authority();
        let first = spawn_fighter(&mut world, Vec3::ZERO);
        let second = spawn_fighter(&mut world, Vec3::X);
        let gun = spawn_gun(&mut world, Vec3::ZERO);

        world.bind_weapon(first, gun).unwrap();
        assert_eq!(
            world.bind_weapon(second, gun),
            Err(ActionError::PreconditionNotMet(Precondition::AlreadyOwned))
        );
    }

    #[test]
    fn overlap_prefers_nearest_then_lowest_id() {
        let mut world = World::authority();
        let fighter = spawn_fighter(&mut world, Vec3::ZERO);
        let far = spawn_gun(&mut world, Vec3::new(1.5, 0.0, 0.0));
        let tie_a = spawn_gun(&mut world, Vec3::new(0.0, 0.0, 1.0));
        let tie_b = spawn_gun(&mut world, Vec3::new(0.0, 0.0, -1.0));
        let _out_of_range = spawn_gun(&mut world, Vec3::new(10.0, 0.0, 0.0));

        assert_eq!(world.overlapping_weapons(fighter, 2.0), vec![tie_a, tie_b, far]);
    }

    #[test]
    fn attachments_follow_wielder() {
        let mut world = World::authority();
        let fighter = spawn_fighter(&mut world, Vec3::ZERO);
        let gun = spawn_gun(&mut world, Vec3::ZERO);
        world.bind_weapon(fighter, gun).unwrap();

        world
            .set_transform(fighter, Transform::new(Vec3::new(5.0, 0.0, 0.0), Vec3::NEG_Z))
            .unwrap();
        assert_eq!(world.sync_attachments(Vec3::ZERO), Ok(1));
        assert_eq!(world.weapon(gun).unwrap().transform().position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(world.sync_attachments(Vec3::ZERO), Ok(0));
    }

    #[test]
    fn despawning_wielder_drops_weapon() {
        let mut world = World::authority();
        let fighter = spawn_fighter(&mut world, Vec3::new(0.0, 2.0, 0.0));
        let gun = spawn_gun(&mut world, Vec3::ZERO);
        world.bind_weapon(fighter, gun).unwrap();

        world.despawn(fighter).unwrap();

        assert!(world.combatant(fighter).is_none());
        assert_eq!(world.weapon(gun).unwrap().owner(), None);
        assert_eq!(world.take_removals(), vec![fighter]);
        assert!(world.take_removals().is_empty());
    }

    #[test]
    fn hit_outcome_bumps_even_for_identical_endpoints() {
        let mut world = World::authority();
        let gun = spawn_gun(&mut world, Vec3::ZERO);

        world.record_hit(gun, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let first = world.weapon(gun).unwrap().hit_outcome_version();
        world.record_hit(gun, Vec3::new(1.0, 2.0, 3.0)).unwrap();

        assert_eq!(world.weapon(gun).unwrap().hit_outcome_version(), first + 1);
    }
}
