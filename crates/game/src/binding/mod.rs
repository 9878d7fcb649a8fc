use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::authority::ExecutionContext;
use crate::error::{ActionError, Precondition};
use crate::net::ActionKind;
use crate::world::{EntityId, WeaponId, World};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub pickup_radius: f32,
    pub socket_name: String,
    /// Socket position in the wielder's frame (x right, y up, z forward).
    pub socket_offset: Vec3,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            pickup_radius: 2.0,
            socket_name: "WeaponSocket".to_string(),
            socket_offset: Vec3::new(0.25, 0.4, 0.3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingOutcome {
    Equipped(WeaponId),
    Unequipped(WeaponId),
    Forwarded { request_id: u32, kind: ActionKind },
}

/// Equip and unequip for one participant. Observers check their mirror and
/// forward; the authority transfers ownership.
#[derive(Debug, Clone, Default)]
pub struct WeaponBindingController {
    config: BindingConfig,
}

impl WeaponBindingController {
    pub fn new(config: BindingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn interact(
        &self,
        world: &mut World,
        combatant: EntityId,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<BindingOutcome, ActionError> {
        let bound = world
            .combatant(combatant)
            .ok_or(Precondition::UnknownEntity(combatant.0))?
            .bound_weapon();

        if bound.is_some() {
            self.unequip(world, combatant, ctx)
        } else {
            self.equip(world, combatant, ctx)
        }
    }

    pub fn equip(
        &self,
        world: &mut World,
        combatant: EntityId,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<BindingOutcome, ActionError> {
        world.require(ctx.role(), "equip")?;

        let wielder = world
            .combatant(combatant)
            .ok_or(Precondition::UnknownEntity(combatant.0))?;
        if wielder.bound_weapon().is_some() {
            return Err(Precondition::AlreadyOwned.into());
        }

        let candidate = world
            .overlapping_weapons(combatant, self.config.pickup_radius)
            .first()
            .copied()
            .ok_or(Precondition::NothingToEquip)?;

        match ctx {
            ExecutionContext::Authority(_) => {
                world.bind_weapon(combatant, candidate)?;
                world.sync_attachments(self.config.socket_offset)?;
                log::info!(
                    "{} equipped {} on {}",
                    combatant,
                    candidate,
                    self.config.socket_name
                );
                Ok(BindingOutcome::Equipped(candidate))
            }
            ExecutionContext::Observer(outbox) => Ok(BindingOutcome::Forwarded {
                request_id: outbox.push(ActionKind::Equip),
                kind: ActionKind::Equip,
            }),
        }
    }

    pub fn unequip(
        &self,
        world: &mut World,
        combatant: EntityId,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<BindingOutcome, ActionError> {
        world.require(ctx.role(), "unequip")?;

        world
            .combatant(combatant)
            .ok_or(Precondition::UnknownEntity(combatant.0))?
            .bound_weapon()
            .ok_or(Precondition::NoWeaponBound)?;

        match ctx {
            ExecutionContext::Authority(_) => {
                let weapon = world.unbind_weapon(combatant)?;
                log::info!("{} dropped {}", combatant, weapon);
                Ok(BindingOutcome::Unequipped(weapon))
            }
            ExecutionContext::Observer(outbox) => Ok(BindingOutcome::Forwarded {
                request_id: outbox.push(ActionKind::Unequip),
                kind: ActionKind::Unequip,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::AuthorityServices;
    use crate::event::Notifications;
    use crate::health::HealthConfig;
    use crate::link::ActionOutbox;
    use crate::physics::PhysicsWorld;
    use crate::weapon::WeaponConfig;
    use crate::world::{CombatantShape, PeerId, Transform};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn arena(gun_at: Vec3) -> (World, EntityId, WeaponId) {
        let mut world = World::authority();
        let fighter = world
            .spawn_combatant(
                PeerId::HOST,
                Transform::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z),
                CombatantShape::default(),
                &HealthConfig::default(),
            )
            .unwrap();
        let gun = world
            .spawn_weapon(WeaponConfig::default(), Transform::at(gun_at))
            .unwrap();
        (world, fighter, gun)
    }

    fn with_authority<R>(f: impl FnOnce(&mut ExecutionContext<'_>) -> R) -> R {
        let physics = PhysicsWorld::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut notifications = Notifications::new();
        let mut ctx = ExecutionContext::Authority(AuthorityServices {
            physics: &physics,
            rng: &mut rng,
            notifications: &mut notifications,
        });
        f(&mut ctx)
    }

    #[test]
    fn interact_toggles_between_equip_and_unequip() {
        let (mut world, fighter, gun) = arena(Vec3::new(1.0, 0.0, 0.0));
        let binding = WeaponBindingController::default();

        let equipped = with_authority(|ctx| binding.interact(&mut world, fighter, ctx));
        assert_eq!(equipped, Ok(BindingOutcome::Equipped(gun)));
        assert_eq!(world.weapon(gun).unwrap().owner(), Some(fighter));

        let dropped = with_authority(|ctx| binding.interact(&mut world, fighter, ctx));
        assert_eq!(dropped, Ok(BindingOutcome::Unequipped(gun)));
        assert_eq!(world.combatant(fighter).unwrap().bound_weapon(), None);
        assert_eq!(
            world.weapon(gun).unwrap().transform().position,
            Vec3::new(0.0, 1.0 - 0.9, 0.0)
        );
    }

    #[test]
    fn equip_with_nothing_in_range_changes_nothing() {
        let (mut world, fighter, gun) = arena(Vec3::new(30.0, 0.0, 0.0));
        let binding = WeaponBindingController::default();

        let result = with_authority(|ctx| binding.equip(&mut world, fighter, ctx));

        assert_eq!(
            result,
            Err(ActionError::PreconditionNotMet(Precondition::NothingToEquip))
        );
        assert_eq!(world.weapon(gun).unwrap().owner(), None);
        assert_eq!(world.combatant(fighter).unwrap().bound_weapon(), None);
    }

    #[test]
    fn equipped_weapon_snaps_to_socket() {
        let (mut world, fighter, gun) = arena(Vec3::new(1.0, 0.0, 0.0));
        let binding = WeaponBindingController::default();

        with_authority(|ctx| binding.equip(&mut world, fighter, ctx)).unwrap();

        let wielder = world.combatant(fighter).unwrap().transform();
        let expected = wielder.local_to_world(binding.config().socket_offset);
        assert!((world.weapon(gun).unwrap().transform().position - expected).length() < 1e-5);
    }

    #[test]
    fn observer_without_candidate_forwards_nothing() {
        let mut world = World::observer();
        let mut outbox = ActionOutbox::default();
        let binding = WeaponBindingController::default();

        let result = binding.equip(
            &mut world,
            EntityId(1),
            &mut ExecutionContext::Observer(&mut outbox),
        );

        assert_eq!(
            result,
            Err(ActionError::PreconditionNotMet(Precondition::UnknownEntity(1)))
        );
        assert!(outbox.is_empty());
    }

    #[test]
    fn mismatched_context_is_a_role_violation() {
        let (mut world, fighter, _) = arena(Vec3::ZERO);
        let mut outbox = ActionOutbox::default();
        let binding = WeaponBindingController::default();

        let result = binding.equip(
            &mut world,
            fighter,
            &mut ExecutionContext::Observer(&mut outbox),
        );

        assert_eq!(result, Err(ActionError::RoleViolation));
        assert!(outbox.is_empty());
    }
}
