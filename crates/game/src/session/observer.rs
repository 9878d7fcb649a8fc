use std::collections::VecDeque;
use std::net::SocketAddr;

use crate::authority::ExecutionContext;
use crate::binding::BindingOutcome;
use crate::combat::CombatController;
use crate::error::{ActionError, NetError};
use crate::event::Notifications;
use crate::link::ActionOutbox;
use crate::net::{
    AckTracker, ActionBatch, NetworkStats, Packet, PacketHeader, PacketType, ReceiveTracker,
    ReplicationUpdate, Transport,
};
use crate::simulation::FixedTimestep;
use crate::weapon::FireOutcome;
use crate::world::{EntityId, PeerId, World};

use super::config::ObserverConfig;
use super::events::{LeaveReason, SessionEvent};

const MAX_UNACKED_PACKETS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Disconnected,
    Joining,
    Connected,
    Denied,
}

/// A non-authoritative participant: mirrors the host's world, runs its own
/// fire cadence and forwards every action.
pub struct ObserverSession<T: Transport> {
    transport: T,
    host: SocketAddr,
    config: ObserverConfig,
    state: ObserverState,
    session: u64,
    peer: Option<PeerId>,
    controlled: Option<EntityId>,
    world: World,
    combat: CombatController,
    outbox: ActionOutbox,
    receive_tracker: ReceiveTracker,
    ack_tracker: AckTracker,
    notifications: Notifications,
    timestep: FixedTimestep,
    send_sequence: u32,
    tick: u32,
    time: f64,
    last_join_sent: f64,
    last_receive: f64,
    events: VecDeque<SessionEvent>,
}

impl<T: Transport> ObserverSession<T> {
    pub fn new(transport: T, host: SocketAddr, config: ObserverConfig) -> Self {
        Self {
            transport,
            host,
            state: ObserverState::Disconnected,
            session: 0,
            peer: None,
            controlled: None,
            world: World::observer(),
            combat: CombatController::new(config.binding.clone()),
            outbox: ActionOutbox::new(config.resend_interval),
            receive_tracker: ReceiveTracker::new(),
            ack_tracker: AckTracker::new(MAX_UNACKED_PACKETS),
            notifications: Notifications::new(),
            timestep: FixedTimestep::new(config.tick_rate),
            send_sequence: 0,
            tick: 0,
            time: 0.0,
            last_join_sent: 0.0,
            last_receive: 0.0,
            events: VecDeque::new(),
            config,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn state(&self) -> ObserverState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ObserverState::Connected
    }

    pub fn peer(&self) -> Option<PeerId> {
        self.peer
    }

    /// The combatant this participant controls, once welcomed.
    pub fn controlled(&self) -> Option<EntityId> {
        self.controlled
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn pending_actions(&self) -> usize {
        self.outbox.len()
    }

    pub fn stats(&self) -> &NetworkStats {
        self.transport.stats()
    }

    pub fn rtt_ms(&self) -> f32 {
        self.ack_tracker.srtt_ms()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.events.drain(..)
    }

    pub fn connect(&mut self) {
        if matches!(self.state, ObserverState::Connected | ObserverState::Joining) {
            return;
        }
        self.reset_session();
        self.state = ObserverState::Joining;
        self.last_receive = self.time;
        self.send_join();
    }

    pub fn disconnect(&mut self) {
        if matches!(self.state, ObserverState::Connected | ObserverState::Joining) {
            self.send_untracked(PacketType::Disconnect);
            self.lose_host(LeaveReason::Graceful);
        }
    }

    pub fn start_fire(&mut self) -> Result<Option<FireOutcome>, ActionError> {
        let combatant = self.controlled_entity()?;
        let mut ctx = ExecutionContext::Observer(&mut self.outbox);
        self.combat
            .start_fire(&mut self.world, combatant, self.time, &mut ctx)
    }

    pub fn stop_fire(&mut self) -> bool {
        match self.controlled {
            Some(combatant) => self.combat.stop_fire(combatant),
            None => false,
        }
    }

    pub fn interact(&mut self) -> Result<BindingOutcome, ActionError> {
        let combatant = self.controlled_entity()?;
        let mut ctx = ExecutionContext::Observer(&mut self.outbox);
        self.combat.interact(&mut self.world, combatant, &mut ctx)
    }

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

        if let Err(err) = self.process_network() {
            log::error!("receive failed: {}", err);
        }

        match self.state {
            ObserverState::Joining => {
                if self.time - self.last_join_sent >= self.config.join_retry_secs {
                    self.send_join();
                }
            }
            ObserverState::Connected => {
                if self.time - self.last_receive > self.config.host_timeout_secs {
                    log::warn!("host {} timed out", self.host);
                    self.lose_host(LeaveReason::Timeout);
                    return;
                }

                let mut ctx = ExecutionContext::Observer(&mut self.outbox);
                self.combat.poll(&mut self.world, self.time, &mut ctx);
                self.send_actions();
            }
            ObserverState::Disconnected | ObserverState::Denied => {}
        }
    }

    fn controlled_entity(&self) -> Result<EntityId, ActionError> {
        self.controlled
            .filter(|_| self.is_connected())
            .ok_or(ActionError::InvalidInput("not joined"))
    }

    fn process_network(&mut self) -> Result<(), NetError> {
        for (packet, addr) in self.transport.receive()? {
            if addr != self.host {
                log::debug!("ignoring packet from {}", addr);
                continue;
            }
            self.last_receive = self.time;

            match packet.payload {
                PacketType::Welcome {
                    session,
                    peer_id,
                    entity_id,
                } => {
                    if session == self.session {
                        self.handle_welcome(PeerId(peer_id), EntityId(entity_id));
                    } else {
                        log::debug!("ignoring welcome for an earlier session");
                    }
                }
                PacketType::Denied { reason } => {
                    if self.state == ObserverState::Joining {
                        log::warn!("join denied by {}: {}", addr, reason);
                        self.state = ObserverState::Denied;
                        self.events.push_back(SessionEvent::JoinDenied { addr, reason });
                    }
                }
                PacketType::Replication(update) => {
                    self.handle_replication(packet.header, &update);
                }
                PacketType::Disconnect => {
                    log::info!("host {} closed the session", addr);
                    self.lose_host(LeaveReason::Kicked);
                }
                _ => log::debug!("ignoring unexpected packet from {}", addr),
            }
        }
        Ok(())
    }

    fn handle_welcome(&mut self, peer: PeerId, entity: EntityId) {
        if self.state != ObserverState::Joining {
            return;
        }
        log::info!("joined {} as {} controlling {}", self.host, peer, entity);
        self.state = ObserverState::Connected;
        self.peer = Some(peer);
        self.controlled = Some(entity);
        self.events
            .push_back(SessionEvent::Welcomed { peer, entity });
    }

    fn handle_replication(&mut self, header: PacketHeader, update: &ReplicationUpdate) {
        // Before the welcome, replication may still belong to an earlier
        // session on this address.
        if self.state != ObserverState::Connected {
            return;
        }
        if !self.receive_tracker.record_received(header.sequence) {
            return;
        }
        self.ack_tracker
            .process_ack(header.ack, header.ack_bitfield, self.time);

        if let Err(err) =
            self.world
                .apply_replication(update, &self.config.weapon, &mut self.notifications)
        {
            log::error!("replication rejected: {}", err);
        }
        self.outbox.ack_up_to(update.action_ack);
    }

    /// One packet per tick, even with nothing to forward: it carries the
    /// acks the host's replication depends on.
    fn send_actions(&mut self) {
        let actions = self.outbox.take_due(self.time);

        self.send_sequence = self.send_sequence.wrapping_add(1).max(1);
        let (ack, ack_bitfield) = self.receive_tracker.ack_data();
        let header = PacketHeader::new(self.send_sequence, ack, ack_bitfield);
        self.ack_tracker.track_packet(header.sequence, self.time);

        let packet = Packet::new(header, PacketType::Actions(ActionBatch { actions }));
        if let Err(err) = self.transport.send_to(&packet, self.host) {
            log::error!("failed to send actions to {}: {}", self.host, err);
        }
    }

    fn send_join(&mut self) {
        self.last_join_sent = self.time;
        self.send_untracked(PacketType::Join {
            session: self.session,
        });
    }

    /// The host numbers a new connection from scratch, so every piece of
    /// per-connection state starts over along with a fresh session id.
    fn reset_session(&mut self) {
        self.session = rand::random();
        self.peer = None;
        self.controlled = None;
        self.world = World::observer();
        self.combat = CombatController::new(self.config.binding.clone());
        self.outbox = ActionOutbox::new(self.config.resend_interval);
        self.receive_tracker = ReceiveTracker::new();
        self.ack_tracker = AckTracker::new(MAX_UNACKED_PACKETS);
        self.send_sequence = 0;
    }

    fn send_untracked(&mut self, payload: PacketType) {
        let packet = Packet::new(PacketHeader::new(0, 0, 0), payload);
        if let Err(err) = self.transport.send_to(&packet, self.host) {
            log::error!("failed to send to {}: {}", self.host, err);
        }
    }

    fn lose_host(&mut self, reason: LeaveReason) {
        if let Some(combatant) = self.controlled {
            self.combat.stop_fire(combatant);
        }
        self.state = ObserverState::Disconnected;
        self.events.push_back(SessionEvent::Disconnected { reason });
    }
}
