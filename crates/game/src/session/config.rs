use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::binding::BindingConfig;
use crate::health::HealthConfig;
use crate::link::DEFAULT_RESEND_INTERVAL;
use crate::net::{PacketLossSimulation, DEFAULT_TICK_RATE};
use crate::weapon::WeaponConfig;
use crate::world::CombatantShape;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub tick_rate: u32,
    /// Replication goes out every this many ticks.
    pub replication_interval: u32,
    pub max_peers: usize,
    pub peer_timeout_secs: f64,
    pub rng_seed: u64,
    /// Joining peers are placed on these in turn.
    pub spawn_points: Vec<Vec3>,
    pub shape: CombatantShape,
    pub health: HealthConfig,
    pub weapon: WeaponConfig,
    pub binding: BindingConfig,
    /// Applied to outgoing packets. Only the loss rate is honoured.
    pub outbound_loss: PacketLossSimulation,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            replication_interval: 1,
            max_peers: 32,
            peer_timeout_secs: 10.0,
            rng_seed: 0x5eed,
            spawn_points: vec![
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(6.0, 1.0, 0.0),
                Vec3::new(-6.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 6.0),
            ],
            shape: CombatantShape::default(),
            health: HealthConfig::default(),
            weapon: WeaponConfig::default(),
            binding: BindingConfig::default(),
            outbound_loss: PacketLossSimulation::default(),
        }
    }
}

impl HostConfig {
    pub fn spawn_point(&self, index: usize) -> Vec3 {
        if self.spawn_points.is_empty() {
            return Vec3::new(0.0, 1.0, 0.0);
        }
        self.spawn_points[index % self.spawn_points.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    pub tick_rate: u32,
    pub resend_interval: f64,
    pub join_retry_secs: f64,
    pub host_timeout_secs: f64,
    /// Weapon configuration is not replicated; mirrored weapons use this.
    pub weapon: WeaponConfig,
    pub binding: BindingConfig,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            resend_interval: DEFAULT_RESEND_INTERVAL,
            join_retry_secs: 0.5,
            host_timeout_secs: 10.0,
            weapon: WeaponConfig::default(),
            binding: BindingConfig::default(),
        }
    }
}
