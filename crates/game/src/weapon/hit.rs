use glam::Vec3;

use crate::authority::AuthorityServices;
use crate::error::{ActionError, Precondition};
use crate::event::{HealthChanged, HitResolved};
use crate::health::{DamageEvent, DamageType};
use crate::world::{EntityId, Role, WeaponId, World};

use super::spread::perturb;

/// Result of one authoritative shot.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotReport {
    pub weapon: WeaponId,
    pub shooter: EntityId,
    pub muzzle: Vec3,
    pub direction: Vec3,
    pub trail_end: Vec3,
    pub spread: f32,
    pub victim: Option<EntityId>,
    pub damage: Option<HealthChanged>,
}

pub struct HitResolver;

impl HitResolver {
    /// Casts the shot from the wielder along its perturbed facing, damages
    /// the first combatant struck and publishes the trail endpoint.
    pub fn resolve(
        world: &mut World,
        weapon: WeaponId,
        now: f64,
        services: &mut AuthorityServices<'_>,
    ) -> Result<ShotReport, ActionError> {
        world.require(Role::Authority, "resolve_shot")?;

        let (max_range, base_damage, trail_parameter) = {
            let item = world
                .weapon(weapon)
                .ok_or(Precondition::UnknownWeapon(weapon.0))?;
            (
                item.config.max_range,
                item.config.base_damage,
                item.config.trail_parameter.clone(),
            )
        };
        let (shooter, controller, origin, forward) = {
            let wielder = world.wielder_of(weapon).ok_or(Precondition::NoWielder)?;
            (
                wielder.id,
                wielder.controller,
                wielder.position(),
                wielder.forward(),
            )
        };

        let spread = world
            .weapon_mut(weapon)
            .map(|item| item.advance_spread(now))
            .ok_or(Precondition::UnknownWeapon(weapon.0))?;
        let direction = perturb(forward, spread, services.rng);

        let hit = services
            .physics
            .cast_ray(origin, direction, max_range, Some(shooter));
        let trail_end = hit.map_or(origin + direction * max_range, |hit| hit.point);
        let victim = hit
            .and_then(|hit| hit.entity)
            .filter(|id| world.combatant(*id).is_some());

        let damage = match victim {
            Some(target) => {
                let event = DamageEvent {
                    amount: base_damage,
                    instigator: Some(controller),
                    causer: Some(shooter),
                    damage_type: DamageType::HitScan,
                };
                match world.apply_damage(target, &event) {
                    Ok(changed) => {
                        services.notifications.health_changed.notify(&changed);
                        Some(changed)
                    }
                    Err(e) => {
                        log::debug!("shot from {} on {} dealt no damage: {}", shooter, target, e);
                        None
                    }
                }
            }
            None => None,
        };

        world.record_hit(weapon, trail_end)?;

        let muzzle = world.weapon(weapon).map(|w| w.muzzle()).unwrap_or(origin);
        services.notifications.hit_resolved.notify(&HitResolved {
            weapon,
            muzzle,
            trail_end,
            trail_parameter,
        });

        Ok(ShotReport {
            weapon,
            shooter,
            muzzle,
            direction,
            trail_end,
            spread,
            victim,
            damage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Notifications;
    use crate::health::HealthConfig;
    use crate::physics::{PhysicsSync, PhysicsWorld};
    use crate::weapon::{WeaponConfig, SPREAD_HARD_CAP};
    use crate::world::{CombatantShape, PeerId, Transform};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Range {
        world: World,
        physics: PhysicsWorld,
        rng: ChaCha8Rng,
        notifications: Notifications,
        shooter: EntityId,
        target: EntityId,
        gun: WeaponId,
    }

    fn shooting_range(target_distance: f32) -> Range {
        let mut world = World::authority();
        let shooter = world
            .spawn_combatant(
                PeerId(2),
                Transform::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z),
                CombatantShape::default(),
                &HealthConfig::default(),
            )
            .unwrap();
        let target = world
            .spawn_combatant(
                PeerId(3),
                Transform::at(Vec3::new(0.0, 1.0, -target_distance)),
                CombatantShape::default(),
                &HealthConfig::default(),
            )
            .unwrap();
        let gun = world
            .spawn_weapon(WeaponConfig::default(), Transform::default())
            .unwrap();
        world.bind_weapon(shooter, gun).unwrap();

        let mut physics = PhysicsWorld::default();
        PhysicsSync::sync_world_to_physics(&world, &mut physics);
        physics.step();

        Range {
            world,
            physics,
            rng: ChaCha8Rng::seed_from_u64(11),
            notifications: Notifications::new(),
            shooter,
            target,
            gun,
        }
    }

    impl Range {
        fn shoot(&mut self, now: f64) -> Result<ShotReport, ActionError> {
            let mut services = AuthorityServices {
                physics: &self.physics,
                rng: &mut self.rng,
                notifications: &mut self.notifications,
            };
            HitResolver::resolve(&mut self.world, self.gun, now, &mut services)
        }
    }

    #[test]
    fn shot_damages_target_and_records_impact() {
        let mut range = shooting_range(4.0);

        let report = range.shoot(1.0).unwrap();

        assert_eq!(report.victim, Some(range.target));
        let damage = report.damage.unwrap();
        assert_eq!(damage.health, 80.0);
        assert_eq!(damage.instigator, Some(PeerId(2)));
        assert_eq!(damage.causer, Some(range.shooter));

        let recorded = range.world.weapon(range.gun).unwrap().trail_end().unwrap();
        assert!((recorded - report.trail_end).length() < 0.01);
        assert!(report.trail_end.z < -3.0);
    }

    #[test]
    fn miss_ends_trail_at_max_range() {
        let mut range = shooting_range(150.0);

        let report = range.shoot(1.0).unwrap();

        assert_eq!(report.victim, None);
        let travelled = (report.trail_end - Vec3::new(0.0, 1.0, 0.0)).length();
        assert!((travelled - 100.0).abs() < 1e-3);
    }

    #[test]
    fn dead_target_still_gets_a_trail_but_no_damage() {
        let mut range = shooting_range(4.0);
        for shot in 0..5 {
            range.shoot(shot as f64).unwrap();
        }
        assert!(range.world.combatant(range.target).unwrap().health().is_dead());

        let version = range.world.weapon(range.gun).unwrap().hit_outcome_version();
        let report = range.shoot(10.0).unwrap();

        assert!(report.damage.is_none());
        assert_eq!(
            range.world.weapon(range.gun).unwrap().hit_outcome_version(),
            version + 1
        );
    }

    #[test]
    fn spread_never_exceeds_cap_during_burst() {
        let mut range = shooting_range(150.0);
        for shot in 0..30 {
            let report = range.shoot(shot as f64 * 0.1).unwrap();
            assert!(report.spread <= SPREAD_HARD_CAP);
        }
    }

    #[test]
    fn same_instant_shots_grow_spread_one_step_each() {
        let mut range = shooting_range(150.0);
        // cooldown * growth * initial with the default config
        let step = 0.2 * 1.5 * 0.05;

        let spreads: Vec<f32> = (0..3).map(|_| range.shoot(2.0).unwrap().spread).collect();

        assert!((spreads[0] - 0.05).abs() < 1e-6);
        assert!((spreads[1] - (0.05 + step)).abs() < 1e-6);
        assert!((spreads[2] - (0.05 + 2.0 * step)).abs() < 1e-6);
    }

    #[test]
    fn unowned_weapon_cannot_fire() {
        let mut range = shooting_range(10.0);
        range.world.unbind_weapon(range.shooter).unwrap();

        assert_eq!(
            range.shoot(1.0),
            Err(ActionError::PreconditionNotMet(Precondition::NoWielder))
        );
    }
}
