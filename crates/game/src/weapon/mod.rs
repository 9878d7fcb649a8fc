mod config;
mod fire;
mod fire_rate;
mod hit;
mod spread;

pub use config::WeaponConfig;
pub use fire::{fire, FireOutcome};
pub use fire_rate::{FireRateController, TimerWheel};
pub use hit::{HitResolver, ShotReport};
pub use spread::{perturb, SpreadConfig, SpreadModel, SPREAD_HARD_CAP};
