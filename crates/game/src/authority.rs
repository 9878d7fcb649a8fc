use rand_chacha::ChaCha8Rng;

use crate::event::Notifications;
use crate::link::ActionOutbox;
use crate::physics::PhysicsWorld;
use crate::world::Role;

/// What only the authoritative process can offer an action: the collision
/// world, the shared random stream and the notification sinks.
pub struct AuthorityServices<'a> {
    pub physics: &'a PhysicsWorld,
    pub rng: &'a mut ChaCha8Rng,
    pub notifications: &'a mut Notifications,
}

/// Passed to every gameplay entry point in place of a role flag. The same
/// call resolves on the authority and forwards on an observer.
pub enum ExecutionContext<'a> {
    Authority(AuthorityServices<'a>),
    Observer(&'a mut ActionOutbox),
}

impl<'a> ExecutionContext<'a> {
    pub fn authority(
        physics: &'a PhysicsWorld,
        rng: &'a mut ChaCha8Rng,
        notifications: &'a mut Notifications,
    ) -> Self {
        Self::Authority(AuthorityServices {
            physics,
            rng,
            notifications,
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Self::Authority(_) => Role::Authority,
            Self::Observer(_) => Role::Observer,
        }
    }
}
