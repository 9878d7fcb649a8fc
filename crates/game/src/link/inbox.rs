use std::collections::HashMap;

use crate::net::ForwardedAction;

/// How far past the next expected request an action may arrive and still be
/// buffered. Anything further is dropped and recovered by resend.
pub const MAX_BUFFERED_ACTIONS: u32 = 256;

/// Host side of the forwarded-action link for one peer: executes each
/// request id at most once, strictly in order.
#[derive(Debug)]
pub struct ActionInbox {
    next_expected: u32,
    buffered: HashMap<u32, ForwardedAction>,
    duplicates: u64,
}

impl Default for ActionInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionInbox {
    pub fn new() -> Self {
        Self {
            next_expected: 1,
            buffered: HashMap::new(),
            duplicates: 0,
        }
    }

    /// Accepts one received action and returns every action now ready to
    /// execute, in request order.
    pub fn receive(&mut self, action: ForwardedAction) -> Vec<ForwardedAction> {
        let offset = action.request_id.wrapping_sub(self.next_expected);
        if offset > u32::MAX / 2 {
            // Already executed.
            self.duplicates += 1;
            return Vec::new();
        }
        if offset >= MAX_BUFFERED_ACTIONS {
            return Vec::new();
        }

        if self.buffered.insert(action.request_id, action).is_some() {
            self.duplicates += 1;
        }

        let mut ready = Vec::new();
        while let Some(next) = self.buffered.remove(&self.next_expected) {
            ready.push(next);
            self.next_expected = self.next_expected.wrapping_add(1).max(1);
        }
        ready
    }

    /// Cumulative ack: every request id up to and including this one has
    /// been executed.
    pub fn ack(&self) -> u32 {
        self.next_expected.wrapping_sub(1)
    }

    pub fn buffered(&self) -> usize {
        self.buffered.len()
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ActionKind;

    fn action(request_id: u32) -> ForwardedAction {
        ForwardedAction {
            request_id,
            kind: ActionKind::Fire { weapon_id: 2 },
        }
    }

    fn ids(actions: Vec<ForwardedAction>) -> Vec<u32> {
        actions.into_iter().map(|a| a.request_id).collect()
    }

    #[test]
    fn in_order_actions_execute_immediately() {
        let mut inbox = ActionInbox::new();
        assert_eq!(ids(inbox.receive(action(1))), vec![1]);
        assert_eq!(ids(inbox.receive(action(2))), vec![2]);
        assert_eq!(inbox.ack(), 2);
    }

    #[test]
    fn gaps_are_buffered_until_filled() {
        let mut inbox = ActionInbox::new();

        assert!(inbox.receive(action(3)).is_empty());
        assert!(inbox.receive(action(2)).is_empty());
        assert_eq!(inbox.ack(), 0);
        assert_eq!(inbox.buffered(), 2);

        assert_eq!(ids(inbox.receive(action(1))), vec![1, 2, 3]);
        assert_eq!(inbox.ack(), 3);
        assert_eq!(inbox.buffered(), 0);
    }

    #[test]
    fn duplicates_execute_once() {
        let mut inbox = ActionInbox::new();
        inbox.receive(action(1));
        inbox.receive(action(3));

        assert!(inbox.receive(action(1)).is_empty());
        assert!(inbox.receive(action(3)).is_empty());
        assert_eq!(ids(inbox.receive(action(2))), vec![2, 3]);
        assert!(inbox.receive(action(2)).is_empty());

        assert_eq!(inbox.duplicates(), 3);
    }

    #[test]
    fn far_future_actions_are_dropped() {
        let mut inbox = ActionInbox::new();
        assert!(inbox.receive(action(1 + MAX_BUFFERED_ACTIONS)).is_empty());
        assert_eq!(inbox.buffered(), 0);
    }
}
