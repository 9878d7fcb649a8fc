mod config;
mod events;
mod host;
mod observer;
mod peers;

pub use config::{HostConfig, ObserverConfig};
pub use events::{LeaveReason, SessionEvent};
pub use host::HostSession;
pub use observer::{ObserverSession, ObserverState};
pub use peers::{PeerConnection, PeerTable};
