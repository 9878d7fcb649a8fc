use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound on spread regardless of configuration.
pub const SPREAD_HARD_CAP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadConfig {
    pub initial: f32,
    pub growth_rate: f32,
    pub decay_rate: f32,
    /// Seconds between shots below which spread grows.
    pub cooldown: f32,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            initial: 0.05,
            growth_rate: 1.5,
            decay_rate: 3.0,
            cooldown: 0.2,
        }
    }
}

impl SpreadConfig {
    pub fn clamped(self) -> Self {
        fn finite_clamp(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
            if value.is_finite() {
                value.clamp(min, max)
            } else {
                fallback
            }
        }

        let defaults = Self::default();
        Self {
            initial: finite_clamp(self.initial, 0.0, SPREAD_HARD_CAP, defaults.initial),
            growth_rate: finite_clamp(self.growth_rate, 1.0, 1.5, defaults.growth_rate),
            decay_rate: finite_clamp(self.decay_rate, 1.0, 4.5, defaults.decay_rate),
            cooldown: finite_clamp(self.cooldown, 0.0, 1.0, defaults.cooldown),
        }
    }
}

/// Inaccuracy as a pure function of the previous value and the time since the
/// last shot. Every participant computes the same sequence from the same
/// inputs; only the authority's value steers the ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadModel {
    config: SpreadConfig,
}

impl SpreadModel {
    pub fn new(config: SpreadConfig) -> Self {
        Self {
            config: config.clamped(),
        }
    }

    pub fn config(&self) -> &SpreadConfig {
        &self.config
    }

    pub fn floor(&self) -> f32 {
        self.config.initial
    }

    /// `elapsed` is `None` before the first shot.
    pub fn update(&self, current: f32, elapsed: Option<f32>) -> f32 {
        let SpreadConfig {
            initial,
            growth_rate,
            decay_rate,
            cooldown,
        } = self.config;

        let Some(elapsed) = elapsed.filter(|e| e.is_finite()) else {
            return initial;
        };

        let rate = if elapsed > cooldown {
            decay_rate
        } else {
            growth_rate
        };
        let next = current + (cooldown - elapsed) * rate * initial;

        if next.is_finite() {
            next.clamp(initial, SPREAD_HARD_CAP)
        } else {
            initial
        }
    }
}

/// Offsets `forward` along the two axes orthogonal to it by independent
/// uniform draws in `[-spread, spread]`, then renormalizes.
pub fn perturb<R: Rng>(forward: Vec3, spread: f32, rng: &mut R) -> Vec3 {
    let Some(forward) = forward.try_normalize() else {
        return Vec3::Z;
    };
    if spread <= 0.0 {
        return forward;
    }

    let right = forward
        .cross(Vec3::Y)
        .try_normalize()
        .unwrap_or(Vec3::X);
    let up = right.cross(forward);

    let horizontal = rng.gen_range(-spread..=spread);
    let vertical = rng.gen_range(-spread..=spread);

    (forward + right * horizontal + up * vertical)
        .try_normalize()
        .unwrap_or(forward)
}
