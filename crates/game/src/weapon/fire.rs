use crate::authority::ExecutionContext;
use crate::error::{ActionError, Precondition};
use crate::net::ActionKind;
use crate::world::{WeaponId, World};

use super::hit::{HitResolver, ShotReport};

#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Resolved(ShotReport),
    Forwarded { request_id: u32 },
}

/// One shot of `weapon`. The authority resolves it on the spot; an observer
/// advances its own spread for presentation and forwards the request.
pub fn fire(
    world: &mut World,
    weapon: WeaponId,
    now: f64,
    ctx: &mut ExecutionContext<'_>,
) -> Result<FireOutcome, ActionError> {
    world.require(ctx.role(), "fire")?;

    match ctx {
        ExecutionContext::Authority(services) => {
            HitResolver::resolve(world, weapon, now, services).map(FireOutcome::Resolved)
        }
        ExecutionContext::Observer(outbox) => {
            let item = world
                .weapon_mut(weapon)
                .ok_or(Precondition::UnknownWeapon(weapon.0))?;
            if item.owner().is_none() {
                return Err(Precondition::NoWielder.into());
            }
            item.advance_spread(now);

            let request_id = outbox.push(ActionKind::Fire {
                weapon_id: weapon.0,
            });
            Ok(FireOutcome::Forwarded { request_id })
        }
    }
}
