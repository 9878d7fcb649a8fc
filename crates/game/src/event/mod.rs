mod observers;
mod types;

pub use observers::{Observers, SubscriptionId};
pub use types::{HealthChanged, HitResolved, Notifications};
