use std::collections::VecDeque;

use crate::net::{sequence_lte, ActionKind, ForwardedAction};

pub const DEFAULT_RESEND_INTERVAL: f64 = 0.1;
pub const MAX_ACTIONS_PER_PACKET: usize = 32;

#[derive(Debug, Clone)]
pub struct PendingAction {
    pub action: ForwardedAction,
    pub last_sent: Option<f64>,
    pub attempts: u32,
}

/// Observer side of the forwarded-action link. Actions keep their request
/// id and are resent every `resend_interval` until the host's cumulative
/// ack covers them.
#[derive(Debug)]
pub struct ActionOutbox {
    pending: VecDeque<PendingAction>,
    next_request_id: u32,
    resend_interval: f64,
}

impl Default for ActionOutbox {
    fn default() -> Self {
        Self::new(DEFAULT_RESEND_INTERVAL)
    }
}

impl ActionOutbox {
    pub fn new(resend_interval: f64) -> Self {
        Self {
            pending: VecDeque::new(),
            next_request_id: 1,
            resend_interval,
        }
    }

    pub fn push(&mut self, kind: ActionKind) -> u32 {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);

        self.pending.push_back(PendingAction {
            action: ForwardedAction { request_id, kind },
            last_sent: None,
            attempts: 0,
        });

        request_id
    }

    pub fn ack_up_to(&mut self, action_ack: u32) {
        if action_ack == 0 {
            return;
        }
        while self
            .pending
            .front()
            .is_some_and(|p| sequence_lte(p.action.request_id, action_ack))
        {
            self.pending.pop_front();
        }
    }

    /// Oldest actions that were never sent or whose resend interval has
    /// passed, marked as sent at `now`.
    pub fn take_due(&mut self, now: f64) -> Vec<ForwardedAction> {
        let interval = self.resend_interval;
        self.pending
            .iter_mut()
            .filter(|p| p.last_sent.is_none_or(|sent| now - sent >= interval))
            .take(MAX_ACTIONS_PER_PACKET)
            .map(|p| {
                p.last_sent = Some(now);
                p.attempts += 1;
                p.action
            })
            .collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingAction> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
