//! In-memory session state kept by the host and replayed to newcomers.

pub mod archive;
pub mod registry;
pub mod roster;
pub mod state;

pub use archive::Archive;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use roster::Roster;
pub use state::SessionState;
