use serde::{Deserialize, Serialize};

use crate::error::{ActionError, Precondition};
use crate::replication::Replicated;
use crate::world::{EntityId, PeerId};

pub const DEFAULT_MAX_HEALTH: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageType {
    #[default]
    Generic,
    HitScan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub max_health: f32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_health: DEFAULT_MAX_HEALTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub amount: f32,
    pub instigator: Option<PeerId>,
    pub causer: Option<EntityId>,
    pub damage_type: DamageType,
}

impl DamageEvent {
    pub fn generic(amount: f32) -> Self {
        Self {
            amount,
            instigator: None,
            causer: None,
            damage_type: DamageType::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthDelta {
    pub old: f32,
    pub new: f32,
}

impl HealthDelta {
    pub fn delta(&self) -> f32 {
        self.new - self.old
    }
}

/// Replicated hit points. Only the authority writes `current`; mirrors take
/// whatever newer version arrives and report the difference.
#[derive(Debug, Clone)]
pub struct HealthComponent {
    max: f32,
    current: Replicated<f32>,
}

impl HealthComponent {
    pub fn new(config: &HealthConfig) -> Self {
        let max = if config.max_health > 0.0 {
            config.max_health
        } else {
            DEFAULT_MAX_HEALTH
        };
        Self {
            max,
            current: Replicated::new(max),
        }
    }

    // Mirrors never see the configured maximum; they track the highest value
    // received instead.
    pub(crate) fn mirrored(current: f32, version: u32) -> Self {
        Self {
            max: current,
            current: Replicated::received(current, version),
        }
    }

    pub fn current(&self) -> f32 {
        *self.current.get()
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        self.current() <= 0.0
    }

    pub(crate) fn field(&self) -> &Replicated<f32> {
        &self.current
    }

    pub(crate) fn apply_damage(&mut self, event: &DamageEvent) -> Result<HealthDelta, ActionError> {
        if event.amount.is_nan() || event.amount <= 0.0 {
            return Err(ActionError::InvalidInput("damage amount must be positive"));
        }
        if self.is_dead() {
            return Err(Precondition::TargetDead.into());
        }

        let old = self.current();
        let new = (old - event.amount).clamp(0.0, self.max);
        self.current.set(new);

        Ok(HealthDelta { old, new })
    }

    pub(crate) fn reset(&mut self) -> bool {
        self.current.set(self.max)
    }

    pub(crate) fn apply_replicated(&mut self, value: f32, version: u32) -> Option<HealthDelta> {
        let old = self.current.apply(value, version)?;
        self.max = self.max.max(value);
        Some(HealthDelta { old, new: value })
    }
}
