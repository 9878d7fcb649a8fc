use std::collections::HashMap;

use glam::Vec3;
use rapier3d::prelude::*;

use crate::world::EntityId;

/// Collision channel hit-scan rays test against.
pub const DAMAGEABLE: Group = Group::GROUP_2;
/// Geometry that is solid for movement but lets shots through.
pub const SCENERY: Group = Group::GROUP_3;

fn member_of(channel: Group) -> InteractionGroups {
    InteractionGroups::new(channel, Group::ALL, InteractionTestMode::And)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub distance: f32,
    /// `None` for level geometry.
    pub entity: Option<EntityId>,
}

/// Collision world for hit-scan queries. Combatants are kinematic bodies
/// placed by the simulation; level geometry is static. Nothing is
/// integrated, `step` only refreshes the broad phase.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector,
    entity_bodies: HashMap<EntityId, RigidBodyHandle>,
    collider_entities: HashMap<ColliderHandle, EntityId>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(60)
    }
}

impl PhysicsWorld {
    pub fn new(tick_rate: u32) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = 1.0 / tick_rate.max(1) as Real;

        Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: Vector::new(0.0, 0.0, 0.0),
            entity_bodies: HashMap::new(),
            collider_entities: HashMap::new(),
        }
    }

    pub fn step(&mut self) {
        self.pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    pub fn add_combatant(
        &mut self,
        entity: EntityId,
        position: Vec3,
        radius: Real,
        half_height: Real,
    ) -> RigidBodyHandle {
        if let Some(&handle) = self.entity_bodies.get(&entity) {
            self.set_body_position(handle, position);
            return handle;
        }

        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(Vector::new(position.x, position.y, position.z))
            .lock_rotations()
            .build();
        let handle = self.bodies.insert(body);

        let collider = ColliderBuilder::cylinder(half_height, radius)
            .friction(0.0)
            .collision_groups(member_of(DAMAGEABLE))
            .build();
        let collider_handle = self
            .colliders
            .insert_with_parent(collider, handle, &mut self.bodies);

        self.entity_bodies.insert(entity, handle);
        self.collider_entities.insert(collider_handle, entity);
        handle
    }

    /// Level geometry that stops shots.
    pub fn add_static_box(&mut self, position: Vec3, half_extents: Vec3) -> ColliderHandle {
        self.add_box_on(position, half_extents, DAMAGEABLE)
    }

    /// Level geometry shots pass through.
    pub fn add_scenery_box(&mut self, position: Vec3, half_extents: Vec3) -> ColliderHandle {
        self.add_box_on(position, half_extents, SCENERY)
    }

    fn add_box_on(&mut self, position: Vec3, half_extents: Vec3, channel: Group) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(Vector::new(position.x, position.y, position.z))
            .collision_groups(member_of(channel))
            .build();
        self.colliders.insert(collider)
    }

    pub fn set_entity_position(&mut self, entity: EntityId, position: Vec3) -> bool {
        match self.entity_bodies.get(&entity) {
            Some(&handle) => {
                self.set_body_position(handle, position);
                true
            }
            None => false,
        }
    }

    fn set_body_position(&mut self, handle: RigidBodyHandle, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let current_rot = *body.rotation();
            let new_pose =
                Pose::from_parts(Vector::new(position.x, position.y, position.z), current_rot);
            body.set_position(new_pose, true);
        }
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> bool {
        let Some(handle) = self.entity_bodies.remove(&entity) else {
            return false;
        };
        self.collider_entities.retain(|_, owner| *owner != entity);
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        true
    }

    pub fn has_entity(&self, entity: EntityId) -> bool {
        self.entity_bodies.contains_key(&entity)
    }

    pub fn tracked_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entity_bodies.keys().copied()
    }

    pub fn entity_position(&self, entity: EntityId) -> Option<Vec3> {
        let handle = self.entity_bodies.get(&entity)?;
        self.bodies.get(*handle).map(|b| {
            let t = b.translation();
            Vec3::new(t.x, t.y, t.z)
        })
    }

    /// First collider on the [`DAMAGEABLE`] channel along the ray. Sensors
    /// and `exclude`'s own body are skipped.
    pub fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: Real,
        exclude: Option<EntityId>,
    ) -> Option<RayHit> {
        let mut filter = QueryFilter::default()
            .exclude_sensors()
            .groups(InteractionGroups::new(
                Group::ALL,
                DAMAGEABLE,
                InteractionTestMode::And,
            ));
        if let Some(&handle) = exclude.and_then(|e| self.entity_bodies.get(&e)) {
            filter = filter.exclude_rigid_body(handle);
        }

        let query = self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        );
        let ray = Ray::new(
            Vector::new(origin.x, origin.y, origin.z),
            Vector::new(direction.x, direction.y, direction.z),
        );

        query
            .cast_ray(&ray, max_distance, true)
            .map(|(collider, toi)| RayHit {
                point: origin + direction * toi,
                distance: toi,
                entity: self.collider_entities.get(&collider).copied(),
            })
    }
}
