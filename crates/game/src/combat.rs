use std::collections::BTreeMap;

use crate::authority::ExecutionContext;
use crate::binding::{BindingConfig, BindingOutcome, WeaponBindingController};
use crate::error::{ActionError, Precondition};
use crate::net::ActionKind;
use crate::weapon::{fire, FireOutcome, FireRateController};
use crate::world::{EntityId, WeaponId, World};

/// Per-participant input handling: the fire cadence of the locally
/// controlled combatants and their equip/unequip requests. The same
/// controller runs on the host and on observers; the context decides
/// whether a shot resolves or forwards.
#[derive(Debug, Default)]
pub struct CombatController {
    fire_rate: FireRateController,
    binding: WeaponBindingController,
    shooters: BTreeMap<WeaponId, EntityId>,
}

impl CombatController {
    pub fn new(binding: BindingConfig) -> Self {
        Self {
            fire_rate: FireRateController::new(),
            binding: WeaponBindingController::new(binding),
            shooters: BTreeMap::new(),
        }
    }

    pub fn binding(&self) -> &WeaponBindingController {
        &self.binding
    }

    /// Fires once right away and arms the repeating timer. `Ok(None)` when
    /// the weapon is already firing.
    pub fn start_fire(
        &mut self,
        world: &mut World,
        combatant: EntityId,
        now: f64,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Option<FireOutcome>, ActionError> {
        world.require(ctx.role(), "start_fire")?;

        let weapon = world
            .combatant(combatant)
            .ok_or(Precondition::UnknownEntity(combatant.0))?
            .bound_weapon()
            .ok_or(Precondition::NoWeaponBound)?;
        let item = world
            .weapon(weapon)
            .ok_or(Precondition::UnknownWeapon(weapon.0))?;
        let period = item.config.period();
        let last_fire = item.state().last_fire;

        if !self.fire_rate.start(weapon, period, last_fire, now) {
            return Ok(None);
        }
        self.shooters.insert(weapon, combatant);

        match fire(world, weapon, now, ctx) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                self.cancel(weapon);
                Err(err)
            }
        }
    }

    /// Cancels local scheduling only. Returns false when nothing was firing.
    pub fn stop_fire(&mut self, combatant: EntityId) -> bool {
        let weapons: Vec<WeaponId> = self
            .shooters
            .iter()
            .filter(|(_, shooter)| **shooter == combatant)
            .map(|(weapon, _)| *weapon)
            .collect();

        let mut stopped = false;
        for weapon in weapons {
            stopped |= self.cancel(weapon);
        }
        stopped
    }

    pub fn interact(
        &mut self,
        world: &mut World,
        combatant: EntityId,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<BindingOutcome, ActionError> {
        let outcome = self.binding.interact(world, combatant, ctx)?;
        if matches!(
            outcome,
            BindingOutcome::Unequipped(_)
                | BindingOutcome::Forwarded {
                    kind: ActionKind::Unequip,
                    ..
                }
        ) {
            self.stop_fire(combatant);
        }
        Ok(outcome)
    }

    pub fn equip(
        &mut self,
        world: &mut World,
        combatant: EntityId,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<BindingOutcome, ActionError> {
        self.binding.equip(world, combatant, ctx)
    }

    pub fn unequip(
        &mut self,
        world: &mut World,
        combatant: EntityId,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<BindingOutcome, ActionError> {
        let outcome = self.binding.unequip(world, combatant, ctx)?;
        self.stop_fire(combatant);
        Ok(outcome)
    }

    /// Runs every repetition that came due up to `now`, each at its own due
    /// time. Timers whose weapon left its shooter's hands are dropped first.
    pub fn poll(
        &mut self,
        world: &mut World,
        now: f64,
        ctx: &mut ExecutionContext<'_>,
    ) -> Vec<FireOutcome> {
        let shooters = &self.shooters;
        let due = self.fire_rate.poll(now, |weapon| {
            shooters.get(&weapon).is_some_and(|shooter| {
                world
                    .combatant(*shooter)
                    .and_then(|c| c.bound_weapon())
                    == Some(weapon)
            })
        });
        let fire_rate = &self.fire_rate;
        self.shooters.retain(|weapon, _| fire_rate.is_firing(*weapon));

        let mut outcomes = Vec::with_capacity(due.len());
        for (weapon, due_at) in due {
            match fire(world, weapon, due_at, ctx) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    log::debug!("stopping {}: {}", weapon, err);
                    self.cancel(weapon);
                }
            }
        }
        outcomes
    }

    pub fn is_firing(&self, weapon: WeaponId) -> bool {
        self.fire_rate.is_firing(weapon)
    }

    pub fn active_timers(&self) -> usize {
        self.fire_rate.active()
    }

    fn cancel(&mut self, weapon: WeaponId) -> bool {
        self.shooters.remove(&weapon);
        self.fire_rate.stop(weapon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::AuthorityServices;
    use crate::event::Notifications;
    use crate::health::HealthConfig;
    use crate::link::ActionOutbox;
    use crate::physics::{PhysicsSync, PhysicsWorld};
    use crate::replication::ReplicationChannel;
    use crate::weapon::WeaponConfig;
    use crate::world::{CombatantShape, PeerId, Transform};
    use glam::Vec3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Arena {
        world: World,
        physics: PhysicsWorld,
        rng: ChaCha8Rng,
        notifications: Notifications,
        combat: CombatController,
        shooter: EntityId,
        target: EntityId,
        gun: WeaponId,
    }

    impl Arena {
        fn new() -> Self {
            let mut world = World::authority();
            let shooter = world
                .spawn_combatant(
                    PeerId::HOST,
                    Transform::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z),
                    CombatantShape::default(),
                    &HealthConfig::default(),
                )
                .unwrap();
            let target = world
                .spawn_combatant(
                    PeerId(1),
                    Transform::at(Vec3::new(0.0, 1.0, -3.0)),
                    CombatantShape::default(),
                    &HealthConfig::default(),
                )
                .unwrap();
            let gun = world
                .spawn_weapon(WeaponConfig::default(), Transform::at(Vec3::new(0.5, 0.5, 0.0)))
                .unwrap();
            world.bind_weapon(shooter, gun).unwrap();

            let mut physics = PhysicsWorld::default();
            PhysicsSync::sync_world_to_physics(&world, &mut physics);
            physics.step();

            Self {
                world,
                physics,
                rng: ChaCha8Rng::seed_from_u64(3),
                notifications: Notifications::new(),
                combat: CombatController::default(),
                shooter,
                target,
                gun,
            }
        }

        fn start(&mut self, now: f64) -> Result<Option<FireOutcome>, ActionError> {
            let mut ctx = ExecutionContext::Authority(AuthorityServices {
                physics: &self.physics,
                rng: &mut self.rng,
                notifications: &mut self.notifications,
            });
            self.combat
                .start_fire(&mut self.world, self.shooter, now, &mut ctx)
        }

        fn poll(&mut self, now: f64) -> Vec<FireOutcome> {
            let mut ctx = ExecutionContext::Authority(AuthorityServices {
                physics: &self.physics,
                rng: &mut self.rng,
                notifications: &mut self.notifications,
            });
            self.combat.poll(&mut self.world, now, &mut ctx)
        }

        fn interact(&mut self) -> Result<BindingOutcome, ActionError> {
            let mut ctx = ExecutionContext::Authority(AuthorityServices {
                physics: &self.physics,
                rng: &mut self.rng,
                notifications: &mut self.notifications,
            });
            self.combat
                .interact(&mut self.world, self.shooter, &mut ctx)
        }
    }

    #[test]
    fn start_fire_shoots_immediately() {
        let mut arena = Arena::new();

        let outcome = arena.start(1.0).unwrap();

        match outcome {
            Some(FireOutcome::Resolved(report)) => assert_eq!(report.victim, Some(arena.target)),
            other => panic!("expected a resolved shot, got {:?}", other),
        }
        assert_eq!(
            arena.world.combatant(arena.target).unwrap().health().current(),
            80.0
        );
    }

    #[test]
    fn second_start_does_not_add_a_timer() {
        let mut arena = Arena::new();

        assert!(arena.start(1.0).unwrap().is_some());
        assert!(arena.start(1.01).unwrap().is_none());

        assert_eq!(arena.combat.active_timers(), 1);
        assert_eq!(arena.poll(1.15).len(), 1);
    }

    #[test]
    fn poll_catches_up_on_long_ticks() {
        let mut arena = Arena::new();
        arena.start(1.0).unwrap();

        assert_eq!(arena.poll(1.35).len(), 3);
        assert!(arena.poll(1.36).is_empty());
    }

    #[test]
    fn stop_fire_halts_repetitions() {
        let mut arena = Arena::new();
        arena.start(1.0).unwrap();

        assert!(arena.combat.stop_fire(arena.shooter));
        assert!(!arena.combat.stop_fire(arena.shooter));
        assert!(arena.poll(5.0).is_empty());
        assert!(!arena.combat.is_firing(arena.gun));
    }

    #[test]
    fn start_without_weapon_does_nothing() {
        let mut arena = Arena::new();
        arena.world.unbind_weapon(arena.shooter).unwrap();

        let result = arena.start(1.0);

        assert_eq!(
            result,
            Err(ActionError::PreconditionNotMet(Precondition::NoWeaponBound))
        );
        assert_eq!(arena.combat.active_timers(), 0);
        assert_eq!(
            arena.world.combatant(arena.target).unwrap().health().current(),
            100.0
        );
    }

    #[test]
    fn unequip_cancels_the_timer() {
        let mut arena = Arena::new();
        arena.start(1.0).unwrap();

        assert_eq!(arena.interact(), Ok(BindingOutcome::Unequipped(arena.gun)));

        assert_eq!(arena.combat.active_timers(), 0);
        assert!(arena.poll(2.0).is_empty());
    }

    #[test]
    fn timer_dropped_when_weapon_taken_away() {
        let mut arena = Arena::new();
        arena.start(1.0).unwrap();

        arena.world.unbind_weapon(arena.shooter).unwrap();

        assert!(arena.poll(2.0).is_empty());
        assert_eq!(arena.combat.active_timers(), 0);
    }

    fn mirror_of(host: &World) -> World {
        let mut mirror = World::observer();
        let updates = ReplicationChannel::new().build_updates(host, 1, 0);
        for update in &updates {
            mirror
                .apply_replication(update, &WeaponConfig::default(), &mut Notifications::new())
                .unwrap();
        }
        mirror
    }

    #[test]
    fn observer_forwards_every_shot() {
        let arena = Arena::new();
        let mut mirror = mirror_of(&arena.world);
        let mut outbox = ActionOutbox::default();
        let mut combat = CombatController::default();

        let first = combat
            .start_fire(
                &mut mirror,
                arena.shooter,
                1.0,
                &mut ExecutionContext::Observer(&mut outbox),
            )
            .unwrap();
        assert_eq!(first, Some(FireOutcome::Forwarded { request_id: 1 }));

        let repeated = combat.poll(&mut mirror, 1.25, &mut ExecutionContext::Observer(&mut outbox));
        assert_eq!(repeated.len(), 2);
        assert_eq!(outbox.len(), 3);
        assert!(outbox.pending().all(|p| p.action.kind
            == ActionKind::Fire {
                weapon_id: arena.gun.0
            }));
    }

    #[test]
    fn observer_without_weapon_forwards_nothing() {
        let arena = Arena::new();
        let mut mirror = mirror_of(&arena.world);
        let mut outbox = ActionOutbox::default();
        let mut combat = CombatController::default();

        let result = combat.start_fire(
            &mut mirror,
            arena.target,
            1.0,
            &mut ExecutionContext::Observer(&mut outbox),
        );

        assert!(result.is_err());
        assert!(outbox.is_empty());
        assert_eq!(combat.active_timers(), 0);
    }
}
