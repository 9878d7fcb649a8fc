mod sync;
mod world;

pub use sync::PhysicsSync;
pub use world::{PhysicsWorld, RayHit};
