//! Chat loops: the per-participant peer loop, the host relay and the process loop driving both.

pub mod frontend;
pub mod peer_loop;
pub mod process;
pub mod relay_loop;

pub use frontend::{ChatFrontend, SessionObserver};
pub use peer_loop::PeerLoop;
pub use process::{ChatSession, SessionEnd};
pub use relay_loop::HostRelay;

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Nothing was ready
    Idle,
    /// At least one event was handled
    Ok,
    /// The host closed our connection; the session is over
    HostGone,
}
