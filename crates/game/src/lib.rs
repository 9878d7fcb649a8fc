pub mod authority;
pub mod binding;
pub mod combat;
pub mod error;
pub mod event;
pub mod health;
pub mod link;
pub mod net;
pub mod physics;
pub mod replication;
pub mod session;
pub mod simulation;
pub mod weapon;
pub mod world;

pub use authority::{AuthorityServices, ExecutionContext};
pub use binding::{BindingConfig, BindingOutcome, WeaponBindingController};
pub use combat::CombatController;
pub use error::{ActionError, NetError, Precondition};
pub use event::{HealthChanged, HitResolved, Notifications, Observers, SubscriptionId};
pub use health::{DamageEvent, DamageType, HealthComponent, HealthConfig, DEFAULT_MAX_HEALTH};
pub use link::{ActionInbox, ActionOutbox};
pub use net::{
    ActionKind, LoopbackEndpoint, LoopbackHub, NetworkStats, Packet, PacketError, PacketHeader,
    PacketLossSimulation, PacketType, Transport, UdpEndpoint, DEFAULT_PORT, DEFAULT_TICK_RATE,
    MAX_PACKET_SIZE,
};
pub use physics::{PhysicsSync, PhysicsWorld, RayHit};
pub use replication::{FieldMask, Replicated, ReplicationChannel};
pub use session::{
    HostConfig, HostSession, LeaveReason, ObserverConfig, ObserverSession, ObserverState,
    SessionEvent,
};
pub use simulation::FixedTimestep;
pub use weapon::{
    fire, FireOutcome, FireRateController, HitResolver, ShotReport, SpreadConfig, SpreadModel,
    WeaponConfig, SPREAD_HARD_CAP,
};
pub use world::{
    Combatant, CombatantShape, EntityId, EntityKind, PeerId, Role, Transform, Weapon, WeaponId,
    World,
};
