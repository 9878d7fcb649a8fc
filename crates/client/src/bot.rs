use hitscan::{ActionError, ObserverSession, ObserverState, Transport};

const ARM_RETRY_SECS: f64 = 1.0;

/// Timing of the scripted fire pattern.
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub burst_secs: f64,
    pub pause_secs: f64,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            burst_secs: 0.5,
            pause_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Joining,
    Arming { next_try: f64 },
    Firing { until: f64 },
    Resting { until: f64 },
    Finished,
}

/// Drives one observer: join, pick up whatever lies within reach, then
/// alternate bursts and pauses until the session ends.
pub struct Bot<T: Transport> {
    session: ObserverSession<T>,
    script: Script,
    phase: Phase,
}

impl<T: Transport> Bot<T> {
    pub fn new(mut session: ObserverSession<T>, script: Script) -> Self {
        session.connect();
        Self {
            session,
            script,
            phase: Phase::Joining,
        }
    }

    pub fn session(&self) -> &ObserverSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ObserverSession<T> {
        &mut self.session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn update(&mut self, delta: f32) {
        if self.session.update(delta) > 0 {
            self.advance();
        }
    }

    pub fn tick(&mut self) {
        self.session.tick();
        self.advance();
    }

    pub fn quit(&mut self) {
        self.session.disconnect();
        self.phase = Phase::Finished;
    }

    fn advance(&mut self) {
        let now = self.session.time();

        match self.session.state() {
            ObserverState::Joining => return,
            ObserverState::Connected => {}
            ObserverState::Disconnected | ObserverState::Denied => {
                self.phase = Phase::Finished;
                return;
            }
        }

        if !self.is_armed() && matches!(self.phase, Phase::Firing { .. } | Phase::Resting { .. }) {
            log::info!("lost the weapon, looking for another");
            self.session.stop_fire();
            self.phase = Phase::Arming { next_try: now };
        }

        self.phase = match self.phase {
            Phase::Joining => Phase::Arming { next_try: now },
            Phase::Arming { .. } if self.is_armed() => {
                log::info!("armed");
                self.rest(now)
            }
            Phase::Arming { next_try } if now >= next_try => {
                self.try_arm();
                Phase::Arming {
                    next_try: now + ARM_RETRY_SECS,
                }
            }
            Phase::Firing { until } if now >= until => {
                self.session.stop_fire();
                self.rest(now)
            }
            Phase::Resting { until } if now >= until => self.fire(now),
            phase => phase,
        };
    }

    fn is_armed(&self) -> bool {
        self.session
            .controlled()
            .and_then(|entity| self.session.world().combatant(entity))
            .is_some_and(|combatant| combatant.bound_weapon().is_some())
    }

    fn try_arm(&mut self) {
        match self.session.interact() {
            Ok(outcome) => log::debug!("interact: {:?}", outcome),
            Err(ActionError::PreconditionNotMet(reason)) => {
                log::debug!("nothing to pick up yet: {}", reason);
            }
            Err(err) => log::warn!("interact failed: {}", err),
        }
    }

    fn fire(&mut self, now: f64) -> Phase {
        match self.session.start_fire() {
            Ok(_) => Phase::Firing {
                until: now + self.script.burst_secs,
            },
            Err(err) => {
                log::warn!("fire failed: {}", err);
                self.rest(now)
            }
        }
    }

    fn rest(&self, now: f64) -> Phase {
        Phase::Resting {
            until: now + self.script.pause_secs,
        }
    }
}
