//! lanchat core: a small LAN chat where one participant hosts and everyone else joins.
//!
//! Every process runs a single-threaded poll loop. Participants talk to the host over TCP using
//! a 5-byte-header packet format; the host relays every packet to every connection and keeps the
//! session history so late joiners are caught up.

pub mod config;
pub mod core_chat;
pub mod core_net;
pub mod core_session;
pub mod logging;
pub mod metrics;
pub mod shutdown;
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use core_chat::{ChatFrontend, ChatSession, PollStatus, SessionEnd, SessionObserver};
pub use core_net::{JoinTarget, NetError, NetResult};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
