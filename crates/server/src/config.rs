use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use hitscan::{HostConfig, PacketLossSimulation};

use crate::Args;

/// Reads the host configuration from `path` (TOML) when given, then applies
/// the command line on top.
pub fn load(args: &Args) -> Result<HostConfig> {
    let mut config = match &args.config {
        Some(path) => read(path)?,
        None => HostConfig::default(),
    };

    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate = tick_rate;
    }
    if let Some(max_peers) = args.max_peers {
        config.max_peers = max_peers;
    }
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    if args.simulate_packet_loss {
        config.outbound_loss = PacketLossSimulation::lossy(args.loss_percent.clamp(0.0, 100.0));
    }

    Ok(config)
}

fn read(path: &Path) -> Result<HostConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}
