use hitscan::{HealthChanged, HitResolved, Notifications, SessionEvent};

pub fn log_session_event(event: &SessionEvent) {
    match event {
        SessionEvent::PeerJoined { peer, addr, entity } => {
            log::info!("{} joined from {} controlling {}", peer, addr, entity);
        }
        SessionEvent::PeerLeft { peer, reason } => {
            log::info!("{} left ({})", peer, reason.as_str());
        }
        SessionEvent::JoinDenied { addr, reason } => {
            log::warn!("denied {}: {}", addr, reason);
        }
        SessionEvent::Welcomed { .. } | SessionEvent::Disconnected { .. } => {}
    }
}

pub fn subscribe(notifications: &mut Notifications) {
    notifications.health_changed.subscribe(|change: &HealthChanged| {
        match change.instigator {
            Some(instigator) => log::info!(
                "{} health {:.1} ({:+.1}) by {}",
                change.entity,
                change.health,
                change.delta,
                instigator
            ),
            None => log::info!(
                "{} health {:.1} ({:+.1})",
                change.entity,
                change.health,
                change.delta
            ),
        }
    });
    notifications.hit_resolved.subscribe(|hit: &HitResolved| {
        log::debug!(
            "weapon {} hit at ({:.2}, {:.2}, {:.2})",
            hit.weapon,
            hit.trail_end.x,
            hit.trail_end.y,
            hit.trail_end.z
        );
    });
}
