use serde::{Deserialize, Serialize};

use super::spread::SpreadConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    pub base_damage: f32,
    /// Shots per minute.
    pub fire_rate: f32,
    pub max_range: f32,
    pub spread: SpreadConfig,
    pub muzzle_socket: String,
    pub trail_parameter: String,
    /// Distance from the weapon origin to the muzzle along its forward axis.
    pub muzzle_offset: f32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            base_damage: 20.0,
            fire_rate: 600.0,
            max_range: 100.0,
            spread: SpreadConfig::default(),
            muzzle_socket: "Muzzle".to_string(),
            trail_parameter: "BeamEnd".to_string(),
            muzzle_offset: 0.5,
        }
    }
}

impl WeaponConfig {
    /// Seconds between automatic shots.
    pub fn period(&self) -> f64 {
        60.0 / self.fire_rate as f64
    }

    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let positive = |value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };

        Self {
            base_damage: positive(self.base_damage, defaults.base_damage),
            fire_rate: positive(self.fire_rate, defaults.fire_rate),
            max_range: positive(self.max_range, defaults.max_range),
            spread: self.spread.clamped(),
            muzzle_offset: if self.muzzle_offset.is_finite() {
                self.muzzle_offset.max(0.0)
            } else {
                defaults.muzzle_offset
            },
            ..self
        }
    }
}
