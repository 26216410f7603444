//! Networking core: owned TCP endpoints, the packet codec and readiness multiplexing.

pub mod codec;
pub mod errors;
pub mod readiness;
pub mod target;
pub mod transport;

pub use codec::{decode, encode, ChatMessage, Packet, PacketHeader, PacketType, HEADER_SIZE};
pub use errors::{NetError, NetResult};
pub use readiness::{probe, wait_ready, Interest, ReadySet, Readiness};
pub use target::{JoinTarget, TargetParseError};
pub use transport::{Role, TransportHandle, DEFAULT_BACKLOG};
