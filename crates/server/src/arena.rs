use anyhow::Result;
use glam::Vec3;

use hitscan::{HostSession, PeerId, Transform, Transport};

/// Floor, a few cover blocks, some bushes and a weapon next to every spawn point, plus a
/// host-controlled target dummy in the middle.
pub fn populate<T: Transport>(host: &mut HostSession<T>) -> Result<()> {
    host.spawn_blocker(Vec3::new(0.0, -0.5, 0.0), Vec3::new(40.0, 0.5, 40.0));
    for x in [-6.0, 6.0] {
        host.spawn_blocker(Vec3::new(x, 1.0, 0.0), Vec3::new(0.5, 1.0, 3.0));
    }
    for x in [-3.0, 3.0] {
        host.spawn_scenery(Vec3::new(x, 0.75, 6.0), Vec3::new(1.0, 0.75, 1.0));
    }

    let spawn_points = host.config().spawn_points.clone();
    for point in spawn_points {
        let weapon = host.spawn_weapon(Transform::at(point + Vec3::new(1.0, 0.0, 0.0)))?;
        log::debug!("weapon {} placed near {}", weapon, point);
    }

    let dummy = host.spawn_combatant(
        PeerId::HOST,
        Transform::new(Vec3::new(0.0, 1.0, 12.0), Vec3::NEG_Z),
    )?;
    log::info!("target dummy {} at the far end", dummy);
    Ok(())
}
