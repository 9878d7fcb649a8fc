use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    /// 0.0..=100.0
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl PacketLossSimulation {
    pub fn lossy(loss_percent: f32) -> Self {
        Self {
            enabled: true,
            loss_percent,
            ..Default::default()
        }
    }

    pub fn latency(min_latency_ms: u32, max_latency_ms: u32, jitter_ms: u32) -> Self {
        Self {
            enabled: true,
            loss_percent: 0.0,
            min_latency_ms,
            max_latency_ms,
            jitter_ms,
        }
    }

    pub fn should_drop<R: Rng>(&self, rng: &mut R) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.gen_range(0.0..100.0) < self.loss_percent
    }

    pub fn delay_ms<R: Rng>(&self, rng: &mut R) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let base = self.min_latency_ms;
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let spread = if range > 0 { rng.gen_range(0..=range) } else { 0 };
        let jitter = if self.jitter_ms > 0 {
            rng.gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        base + spread + jitter
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn disabled_simulation_is_transparent() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sim = PacketLossSimulation {
            loss_percent: 100.0,
            max_latency_ms: 500,
            ..Default::default()
        };

        assert!(!sim.should_drop(&mut rng));
        assert_eq!(sim.delay_ms(&mut rng), 0);
    }

    #[test]
    fn delay_stays_in_configured_window() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let sim = PacketLossSimulation::latency(20, 60, 10);

        for _ in 0..500 {
            let delay = sim.delay_ms(&mut rng);
            assert!((20..=70).contains(&delay));
        }
    }

    #[test]
    fn total_loss_drops_everything() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sim = PacketLossSimulation::lossy(100.0);

        assert!((0..100).all(|_| sim.should_drop(&mut rng)));
    }
}
