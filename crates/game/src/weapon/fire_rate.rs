use std::collections::BTreeMap;

use crate::world::WeaponId;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Timer {
    next_due: f64,
    period: f64,
}

/// Repeating timers keyed by `K`, at most one per key. Times are simulation
/// seconds supplied by the caller.
#[derive(Debug, Clone)]
pub struct TimerWheel<K> {
    timers: BTreeMap<K, Timer>,
}

impl<K: Ord + Copy> Default for TimerWheel<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Copy> TimerWheel<K> {
    pub fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
        }
    }

    /// Returns false and leaves the existing timer alone when `key` is
    /// already scheduled.
    pub fn schedule(&mut self, key: K, first_due: f64, period: f64) -> bool {
        if self.timers.contains_key(&key) || period <= 0.0 {
            return false;
        }
        self.timers.insert(
            key,
            Timer {
                next_due: first_due,
                period,
            },
        );
        true
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.timers.remove(&key).is_some()
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.timers.contains_key(&key)
    }

    pub fn next_due(&self, key: K) -> Option<f64> {
        self.timers.get(&key).map(|t| t.next_due)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(K) -> bool) {
        self.timers.retain(|key, _| keep(*key));
    }

    /// Every invocation due at or before `now`, in due order. A timer that
    /// fell several periods behind yields one entry per missed period.
    pub fn poll(&mut self, now: f64) -> Vec<(K, f64)> {
        let mut due = Vec::new();
        for (key, timer) in &mut self.timers {
            while timer.next_due <= now {
                due.push((*key, timer.next_due));
                timer.next_due += timer.period;
            }
        }
        due.sort_by(|a, b| a.1.total_cmp(&b.1));
        due
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

/// Automatic fire cadence per weapon. Idle weapons have no timer; firing ones
/// have exactly one.
#[derive(Debug, Clone, Default)]
pub struct FireRateController {
    wheel: TimerWheel<WeaponId>,
}

impl FireRateController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the repeating timer. Returns true when the caller must fire once
    /// right now; false when the weapon was already firing.
    ///
    /// The first repetition is due after the initial delay,
    /// `max(0, last_fire + period - now)`. An initial delay of zero puts the
    /// first repetition one full period after the immediate shot, never at
    /// `now` itself.
    pub fn start(&mut self, weapon: WeaponId, period: f64, last_fire: Option<f64>, now: f64) -> bool {
        if self.wheel.is_scheduled(weapon) {
            return false;
        }

        let initial_delay = last_fire
            .map(|last| (last + period - now).max(0.0))
            .unwrap_or(0.0);
        let first_due = if initial_delay > 0.0 {
            now + initial_delay
        } else {
            now + period
        };

        self.wheel.schedule(weapon, first_due, period)
    }

    pub fn stop(&mut self, weapon: WeaponId) -> bool {
        self.wheel.cancel(weapon)
    }

    pub fn is_firing(&self, weapon: WeaponId) -> bool {
        self.wheel.is_scheduled(weapon)
    }

    /// Drops timers whose weapon `still_bound` rejects, then returns the due
    /// shots.
    pub fn poll(&mut self, now: f64, still_bound: impl FnMut(WeaponId) -> bool) -> Vec<(WeaponId, f64)> {
        self.wheel.retain(still_bound);
        self.wheel.poll(now)
    }

    pub fn active(&self) -> usize {
        self.wheel.len()
    }
}
