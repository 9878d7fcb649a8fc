use std::collections::VecDeque;
use std::net::SocketAddr;

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::authority::ExecutionContext;
use crate::binding::BindingOutcome;
use crate::combat::CombatController;
use crate::error::{ActionError, NetError, Precondition};
use crate::event::Notifications;
use crate::net::{
    ActionBatch, ActionKind, ForwardedAction, NetworkStats, Packet, PacketHeader, PacketType,
    Transport,
};
use crate::physics::{PhysicsSync, PhysicsWorld};
use crate::simulation::FixedTimestep;
use crate::weapon::{fire, FireOutcome};
use crate::world::{EntityId, PeerId, Transform, WeaponId, World};

use super::config::HostConfig;
use super::events::{LeaveReason, SessionEvent};
use super::peers::PeerTable;

/// Stream the loss simulation draws from, kept apart from the gameplay RNG
/// so enabling loss does not change shot spread.
const LOSS_STREAM: u64 = 0x105e;

/// The authoritative process. Owns the only writable copy of every
/// replicated field and resolves every shot.
pub struct HostSession<T: Transport> {
    transport: T,
    config: HostConfig,
    world: World,
    physics: PhysicsWorld,
    rng: ChaCha8Rng,
    loss_rng: ChaCha8Rng,
    combat: CombatController,
    peers: PeerTable,
    notifications: Notifications,
    timestep: FixedTimestep,
    tick: u32,
    time: f64,
    ready: VecDeque<(PeerId, ForwardedAction)>,
    events: VecDeque<SessionEvent>,
    spawned: usize,
}

impl<T: Transport> HostSession<T> {
    pub fn new(transport: T, config: HostConfig) -> Self {
        let mut loss_rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        loss_rng.set_stream(LOSS_STREAM);

        Self {
            transport,
            world: World::authority(),
            physics: PhysicsWorld::new(config.tick_rate),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            loss_rng,
            combat: CombatController::new(config.binding.clone()),
            peers: PeerTable::new(config.max_peers),
            notifications: Notifications::new(),
            timestep: FixedTimestep::new(config.tick_rate),
            tick: 0,
            time: 0.0,
            ready: VecDeque::new(),
            events: VecDeque::new(),
            spawned: 0,
            config,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn stats(&self) -> &NetworkStats {
        self.transport.stats()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer_combatant(&self, peer: PeerId) -> Option<EntityId> {
        self.peers.get(peer).and_then(|c| c.combatant)
    }

    /// True once `peer` has acknowledged every replicated field.
    pub fn peer_synced(&self, peer: PeerId) -> bool {
        self.peers
            .get(peer)
            .is_some_and(|c| c.replication.is_synced(&self.world))
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.events.drain(..)
    }

    pub fn spawn_combatant(
        &mut self,
        controller: PeerId,
        transform: Transform,
    ) -> Result<EntityId, ActionError> {
        self.world.spawn_combatant(
            controller,
            transform,
            self.config.shape,
            &self.config.health,
        )
    }

    pub fn spawn_weapon(&mut self, transform: Transform) -> Result<WeaponId, ActionError> {
        self.world.spawn_weapon(self.config.weapon.clone(), transform)
    }

    /// Level geometry that stops shots without taking damage.
    pub fn spawn_blocker(&mut self, position: Vec3, half_extents: Vec3) {
        self.physics.add_static_box(position, half_extents);
    }

    /// Level geometry shots pass through, such as foliage.
    pub fn spawn_scenery(&mut self, position: Vec3, half_extents: Vec3) {
        self.physics.add_scenery_box(position, half_extents);
    }

    pub fn despawn(&mut self, entity: EntityId) -> Result<(), ActionError> {
        self.combat.stop_fire(entity);
        self.world.despawn(entity)
    }

    pub fn set_transform(
        &mut self,
        entity: EntityId,
        transform: Transform,
    ) -> Result<bool, ActionError> {
        self.world.set_transform(entity, transform)
    }

    pub fn reset_health(&mut self, entity: EntityId) -> Result<bool, ActionError> {
        self.world.reset_health(entity)
    }

    pub fn start_fire(&mut self, entity: EntityId) -> Result<Option<FireOutcome>, ActionError> {
        let mut ctx =
            ExecutionContext::authority(&self.physics, &mut self.rng, &mut self.notifications);
        self.combat
            .start_fire(&mut self.world, entity, self.time, &mut ctx)
    }

    pub fn stop_fire(&mut self, entity: EntityId) -> bool {
        self.combat.stop_fire(entity)
    }

    pub fn interact(&mut self, entity: EntityId) -> Result<BindingOutcome, ActionError> {
        let mut ctx =
            ExecutionContext::authority(&self.physics, &mut self.rng, &mut self.notifications);
        self.combat.interact(&mut self.world, entity, &mut ctx)
    }

    /// Runs as many fixed ticks as `delta` seconds cover.
    pub fn update(&mut self, delta: f32) -> u32 {
        self.timestep.accumulate(delta);

        let mut ticks = 0;
        while self.timestep.consume_tick() {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        self.time += self.timestep.dt() as f64;

        PhysicsSync::sync_world_to_physics(&self.world, &mut self.physics);
        self.physics.step();

        if let Err(err) = self.process_network() {
            log::error!("receive failed: {}", err);
        }
        self.execute_actions();

        let mut ctx =
            ExecutionContext::authority(&self.physics, &mut self.rng, &mut self.notifications);
        self.combat.poll(&mut self.world, self.time, &mut ctx);

        if let Err(err) = self
            .world
            .sync_attachments(self.config.binding.socket_offset)
        {
            log::error!("attachment sync failed: {}", err);
        }

        self.queue_removals();
        if self.tick % self.config.replication_interval.max(1) == 0 {
            self.replicate();
        }
        self.expire_peers();
    }

    pub fn kick(&mut self, peer: PeerId) {
        if let Some(addr) = self.peers.get(peer).map(|c| c.addr) {
            self.send_untracked(addr, PacketType::Disconnect);
        }
        self.drop_peer(peer, LeaveReason::Kicked);
    }

    pub fn shutdown(&mut self) {
        let peers: Vec<PeerId> = self.peers.iter().map(|c| c.peer).collect();
        for peer in peers {
            self.kick(peer);
        }
    }

    fn process_network(&mut self) -> Result<(), NetError> {
        for (packet, addr) in self.transport.receive()? {
            match packet.payload {
                PacketType::Join { session } => self.handle_join(addr, session),
                PacketType::Actions(batch) => self.handle_actions(addr, packet.header, batch),
                PacketType::Disconnect => {
                    if let Some(peer) = self.peers.id_of(&addr) {
                        self.drop_peer(peer, LeaveReason::Graceful);
                    }
                }
                _ => log::debug!("ignoring unexpected packet from {}", addr),
            }
        }
        Ok(())
    }

    fn handle_join(&mut self, addr: SocketAddr, session: u64) {
        if let Some(stale) = self.peers.stale_session(&addr, session) {
            log::info!("{} restarted its session from {}", stale, addr);
            self.drop_peer(stale, LeaveReason::Rejoined);
        }

        let Some((peer, _)) = self.peers.admit(addr, session, self.time) else {
            let reason = "server full".to_string();
            log::warn!("denying join from {}: {}", addr, reason);
            self.send_untracked(
                addr,
                PacketType::Denied {
                    reason: reason.clone(),
                },
            );
            self.events.push_back(SessionEvent::JoinDenied { addr, reason });
            return;
        };

        let Some(connection) = self.peers.get_mut(peer) else {
            return;
        };
        connection.touch(self.time);

        let entity = match connection.combatant {
            Some(entity) => entity,
            None => {
                let spawn = Transform::at(self.config.spawn_point(self.spawned));
                let spawned = self.world.spawn_combatant(
                    peer,
                    spawn,
                    self.config.shape,
                    &self.config.health,
                );
                match spawned {
                    Ok(entity) => {
                        self.spawned += 1;
                        connection.combatant = Some(entity);
                        log::info!("{} joined from {} as {}", peer, addr, entity);
                        self.events.push_back(SessionEvent::PeerJoined {
                            peer,
                            addr,
                            entity,
                        });
                        entity
                    }
                    Err(err) => {
                        log::error!("could not spawn a combatant for {}: {}", peer, err);
                        self.peers.remove(peer);
                        return;
                    }
                }
            }
        };

        // Repeated joins mean the welcome was lost; answer every one.
        self.send_untracked(
            addr,
            PacketType::Welcome {
                session,
                peer_id: peer.0,
                entity_id: entity.0,
            },
        );
    }

    fn handle_actions(&mut self, addr: SocketAddr, header: PacketHeader, batch: ActionBatch) {
        let Some(connection) = self.peers.get_by_addr_mut(&addr) else {
            log::debug!("actions from unknown address {}", addr);
            return;
        };
        connection.touch(self.time);

        if !connection.receive_tracker.record_received(header.sequence) {
            return;
        }
        connection.process_ack(header.ack, header.ack_bitfield, self.time);

        let peer = connection.peer;
        for action in batch.actions {
            for ready in connection.inbox.receive(action) {
                self.ready.push_back((peer, ready));
            }
        }
    }

    fn execute_actions(&mut self) {
        while let Some((peer, action)) = self.ready.pop_front() {
            if let Err(err) = self.execute(peer, action.kind) {
                if !err.is_contract_violation() {
                    log::debug!(
                        "dropping {:?} #{} from {}: {}",
                        action.kind,
                        action.request_id,
                        peer,
                        err
                    );
                }
            }
        }
    }

    fn execute(&mut self, peer: PeerId, kind: ActionKind) -> Result<(), ActionError> {
        let combatant = self
            .peers
            .get(peer)
            .and_then(|c| c.combatant)
            .ok_or(ActionError::InvalidInput("peer has no combatant"))?;

        let mut ctx =
            ExecutionContext::authority(&self.physics, &mut self.rng, &mut self.notifications);

        match kind {
            ActionKind::Fire { weapon_id } => {
                let weapon = EntityId(weapon_id);
                self.world
                    .weapon(weapon)
                    .ok_or(Precondition::UnknownWeapon(weapon_id))?;
                let wielder = self
                    .world
                    .wielder_of(weapon)
                    .ok_or(Precondition::NoWielder)?;
                if wielder.controller != peer {
                    return Err(Precondition::NotController.into());
                }
                fire(&mut self.world, weapon, self.time, &mut ctx).map(|_| ())
            }
            ActionKind::Equip => self
                .combat
                .equip(&mut self.world, combatant, &mut ctx)
                .map(|_| ()),
            ActionKind::Unequip => self
                .combat
                .unequip(&mut self.world, combatant, &mut ctx)
                .map(|_| ()),
        }
    }

    fn queue_removals(&mut self) {
        for removed in self.world.take_removals() {
            for connection in self.peers.iter_mut() {
                connection.replication.queue_removal(removed);
            }
        }
    }

    fn replicate(&mut self) {
        for connection in self.peers.iter_mut() {
            let updates = connection.replication.build_updates(
                &self.world,
                self.tick,
                connection.inbox.ack(),
            );

            for update in updates {
                let header = connection.next_header();
                connection.replication.record_sent(header.sequence, &update);
                connection.track_sent(header.sequence, self.time);

                if self.config.outbound_loss.should_drop(&mut self.loss_rng) {
                    continue;
                }

                let packet = Packet::new(header, PacketType::Replication(update));
                if let Err(err) = self.transport.send_to(&packet, connection.addr) {
                    log::error!("failed to send replication to {}: {}", connection.peer, err);
                }
            }
        }
    }

    fn expire_peers(&mut self) {
        for peer in self
            .peers
            .timed_out(self.time, self.config.peer_timeout_secs)
        {
            log::warn!("{} timed out", peer);
            self.drop_peer(peer, LeaveReason::Timeout);
        }
    }

    /// Removes the peer and its combatant; anything it wielded drops where
    /// it stood.
    fn drop_peer(&mut self, peer: PeerId, reason: LeaveReason) {
        let Some(connection) = self.peers.remove(peer) else {
            return;
        };

        if let Some(entity) = connection.combatant {
            self.combat.stop_fire(entity);
            if let Err(err) = self.world.despawn(entity) {
                log::debug!("despawning {} for {}: {}", entity, peer, err);
            }
        }

        log::info!("{} {}", peer, reason.as_str());
        self.events.push_back(SessionEvent::PeerLeft { peer, reason });
    }

    fn send_untracked(&mut self, addr: SocketAddr, payload: PacketType) {
        let packet = Packet::new(PacketHeader::new(0, 0, 0), payload);
        if let Err(err) = self.transport.send_to(&packet, addr) {
            log::error!("failed to send to {}: {}", addr, err);
        }
    }
}
