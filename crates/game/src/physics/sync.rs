use crate::world::{Combatant, EntityId, World};

use super::PhysicsWorld;

pub struct PhysicsSync;

impl PhysicsSync {
    pub fn combatant_to_physics(combatant: &Combatant, physics: &mut PhysicsWorld) {
        if !physics.set_entity_position(combatant.id, combatant.position()) {
            physics.add_combatant(
                combatant.id,
                combatant.position(),
                combatant.shape.radius,
                combatant.shape.half_height,
            );
        }
    }

    /// Mirrors every combatant into the collision world and drops bodies
    /// whose entity is gone. Takes effect at the next `step`.
    pub fn sync_world_to_physics(world: &World, physics: &mut PhysicsWorld) {
        for combatant in world.combatants() {
            Self::combatant_to_physics(combatant, physics);
        }

        let stale: Vec<EntityId> = physics
            .tracked_entities()
            .filter(|id| world.combatant(*id).is_none())
            .collect();
        for id in stale {
            physics.remove_entity(id);
        }
    }
}
