use std::collections::{BTreeSet, HashMap};

use crate::net::{sequence_greater_than, EntityDelta, FieldPatch, ReplicationUpdate};
use crate::world::{EntityId, EntityKind, World};

use super::field::FieldMask;

/// Entity deltas per packet; keeps the encoded update under the MTU.
pub const MAX_ENTITIES_PER_PACKET: usize = 8;
pub const MAX_REMOVALS_PER_PACKET: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SentField {
    entity: EntityId,
    field: FieldMask,
    version: u32,
}

#[derive(Debug, Default)]
struct InFlight {
    fields: Vec<SentField>,
    removals: Vec<EntityId>,
}

/// Host-side replication state for one observer. Every field whose version
/// is newer than what the observer acknowledged goes out on each send, so a
/// lost packet is repaired by the next one.
#[derive(Debug, Default)]
pub struct ReplicationChannel {
    acked: HashMap<(EntityId, FieldMask), u32>,
    in_flight: HashMap<u32, InFlight>,
    pending_removals: BTreeSet<EntityId>,
}

impl ReplicationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_removal(&mut self, entity: EntityId) {
        self.acked.retain(|(id, _), _| *id != entity);
        self.pending_removals.insert(entity);
    }

    fn is_newer(&self, entity: EntityId, patch: &FieldPatch) -> bool {
        match self.acked.get(&(entity, FieldMask::of(&patch.value))) {
            Some(&acked) => sequence_greater_than(patch.version, acked),
            None => true,
        }
    }

    /// Fields the observer has not acknowledged yet, one delta per entity.
    pub fn collect(&self, world: &World) -> Vec<EntityDelta> {
        let combatants = world.combatants().map(|c| {
            (c.id, EntityKind::Combatant, c.replicated_fields())
        });
        let weapons = world
            .weapons()
            .map(|w| (w.id, EntityKind::Weapon, w.replicated_fields()));

        combatants
            .chain(weapons)
            .filter_map(|(id, kind, fields)| {
                let patches: Vec<FieldPatch> = fields
                    .into_iter()
                    .filter(|patch| self.is_newer(id, patch))
                    .collect();
                (!patches.is_empty()).then(|| EntityDelta {
                    net_id: id.0,
                    kind: kind as u8,
                    patches,
                })
            })
            .collect()
    }

    /// Splits everything outstanding into packet-sized updates. Always
    /// yields at least one update so the action ack keeps flowing.
    pub fn build_updates(&self, world: &World, tick: u32, action_ack: u32) -> Vec<ReplicationUpdate> {
        let deltas = self.collect(world);
        let removals: Vec<u32> = self.pending_removals.iter().map(|id| id.0).collect();

        let mut updates = Vec::new();
        let mut deltas = deltas.into_iter().peekable();
        let mut removals = removals.into_iter().peekable();

        loop {
            let mut update = ReplicationUpdate::new(tick, action_ack);
            update
                .entities
                .extend(deltas.by_ref().take(MAX_ENTITIES_PER_PACKET));
            update
                .removed
                .extend(removals.by_ref().take(MAX_REMOVALS_PER_PACKET));
            updates.push(update);

            if deltas.peek().is_none() && removals.peek().is_none() {
                break;
            }
        }

        updates
    }

    pub fn record_sent(&mut self, sequence: u32, update: &ReplicationUpdate) {
        let mut record = InFlight::default();
        for delta in &update.entities {
            let entity = EntityId(delta.net_id);
            record
                .fields
                .extend(delta.patches.iter().map(|patch| SentField {
                    entity,
                    field: FieldMask::of(&patch.value),
                    version: patch.version,
                }));
        }
        record
            .removals
            .extend(update.removed.iter().copied().map(EntityId));

        if !record.fields.is_empty() || !record.removals.is_empty() {
            self.in_flight.insert(sequence, record);
        }
    }

    pub fn on_acked(&mut self, sequence: u32) {
        let Some(record) = self.in_flight.remove(&sequence) else {
            return;
        };

        for removed in &record.removals {
            self.pending_removals.remove(removed);
        }

        for sent in record.fields {
            if record.removals.contains(&sent.entity)
                || self.pending_removals.contains(&sent.entity)
            {
                continue;
            }
            self.acked
                .entry((sent.entity, sent.field))
                .and_modify(|acked| {
                    if sequence_greater_than(sent.version, *acked) {
                        *acked = sent.version;
                    }
                })
                .or_insert(sent.version);
        }
    }

    /// The packet will never be acked; its contents stay outstanding.
    pub fn on_lost(&mut self, sequence: u32) {
        self.in_flight.remove(&sequence);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_synced(&self, world: &World) -> bool {
        self.pending_removals.is_empty() && self.collect(world).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{DamageEvent, HealthConfig};
    use crate::net::FieldValue;
    use crate::weapon::WeaponConfig;
    use crate::world::{CombatantShape, PeerId, Transform};
    use glam::Vec3;

    fn arena() -> (World, EntityId) {
        let mut world = World::authority();
        let fighter = world
            .spawn_combatant(
                PeerId::HOST,
                Transform::at(Vec3::ZERO),
                CombatantShape::default(),
                &HealthConfig::default(),
            )
            .unwrap();
        (world, fighter)
    }

    fn send(channel: &mut ReplicationChannel, world: &World, sequence: u32) -> ReplicationUpdate {
        let mut updates = channel.build_updates(world, sequence, 0);
        assert_eq!(updates.len(), 1);
        let update = updates.remove(0);
        channel.record_sent(sequence, &update);
        update
    }

    #[test]
    fn first_send_carries_every_field() {
        let (world, fighter) = arena();
        let channel = ReplicationChannel::new();

        let deltas = channel.collect(&world);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].net_id, fighter.0);
        assert_eq!(deltas[0].patches.len(), 3);
    }

    #[test]
    fn acked_fields_are_not_resent() {
        let (mut world, fighter) = arena();
        let mut channel = ReplicationChannel::new();

        send(&mut channel, &world, 1);
        channel.on_acked(1);
        assert!(channel.is_synced(&world));

        world.apply_damage(fighter, &DamageEvent::generic(20.0)).unwrap();
        let update = send(&mut channel, &world, 2);

        assert_eq!(update.entities.len(), 1);
        assert_eq!(update.entities[0].patches.len(), 1);
        assert_eq!(update.entities[0].patches[0].value, FieldValue::Health(80.0));
    }

    #[test]
    fn lost_packet_is_repaired_by_next_send() {
        let (mut world, fighter) = arena();
        let mut channel = ReplicationChannel::new();
        send(&mut channel, &world, 1);
        channel.on_acked(1);

        world.apply_damage(fighter, &DamageEvent::generic(20.0)).unwrap();
        send(&mut channel, &world, 2);
        channel.on_lost(2);

        let retry = send(&mut channel, &world, 3);
        assert_eq!(retry.entities[0].patches[0].value, FieldValue::Health(80.0));
        channel.on_acked(3);
        assert!(channel.is_synced(&world));
    }

    #[test]
    fn late_ack_of_old_version_does_not_regress() {
        let (mut world, fighter) = arena();
        let mut channel = ReplicationChannel::new();

        world.apply_damage(fighter, &DamageEvent::generic(10.0)).unwrap();
        send(&mut channel, &world, 1);
        world.apply_damage(fighter, &DamageEvent::generic(10.0)).unwrap();
        send(&mut channel, &world, 2);

        channel.on_acked(2);
        channel.on_acked(1);

        assert!(channel.is_synced(&world));
    }

    #[test]
    fn removals_repeat_until_acked() {
        let (mut world, fighter) = arena();
        let mut channel = ReplicationChannel::new();
        send(&mut channel, &world, 1);
        channel.on_acked(1);

        world.despawn(fighter).unwrap();
        for removed in world.take_removals() {
            channel.queue_removal(removed);
        }

        assert_eq!(send(&mut channel, &world, 2).removed, vec![fighter.0]);
        assert_eq!(send(&mut channel, &world, 3).removed, vec![fighter.0]);
        channel.on_acked(3);
        assert!(send(&mut channel, &world, 4).removed.is_empty());
    }

    #[test]
    fn large_worlds_split_across_packets() {
        let mut world = World::authority();
        for i in 0..(MAX_ENTITIES_PER_PACKET * 2 + 1) {
            world
                .spawn_weapon(WeaponConfig::default(), Transform::at(Vec3::X * i as f32))
                .unwrap();
        }

        let updates = ReplicationChannel::new().build_updates(&world, 1, 0);

        assert_eq!(updates.len(), 3);
        assert!(updates.iter().all(|u| u.entities.len() <= MAX_ENTITIES_PER_PACKET));
    }

    #[test]
    fn full_update_fits_in_one_datagram() {
        use crate::net::{Packet, PacketHeader, PacketType, MAX_PACKET_SIZE};

        let mut world = World::authority();
        for i in 0..MAX_ENTITIES_PER_PACKET {
            let gun = world
                .spawn_weapon(WeaponConfig::default(), Transform::at(Vec3::X * i as f32))
                .unwrap();
            world.record_hit(gun, Vec3::new(99.0, -3.5, 1234.5)).unwrap();
        }
        let mut channel = ReplicationChannel::new();
        for id in 100..100 + MAX_REMOVALS_PER_PACKET as u32 {
            channel.queue_removal(EntityId(id));
        }

        let mut updates = channel.build_updates(&world, 1, 0);
        assert_eq!(updates.len(), 1);

        let packet = Packet::new(
            PacketHeader::new(1, 0, 0),
            PacketType::Replication(updates.remove(0)),
        );
        assert!(packet.serialize().unwrap().len() <= MAX_PACKET_SIZE);
    }

    #[test]
    fn empty_world_still_yields_one_update() {
        let world = World::authority();
        let updates = ReplicationChannel::new().build_updates(&world, 1, 5);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].action_ack, 5);
    }
}
