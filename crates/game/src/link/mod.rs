mod inbox;
mod outbox;

pub use inbox::{ActionInbox, MAX_BUFFERED_ACTIONS};
pub use outbox::{ActionOutbox, PendingAction, DEFAULT_RESEND_INTERVAL, MAX_ACTIONS_PER_PACKET};
