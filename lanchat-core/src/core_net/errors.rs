//! Error types for the networking core

use std::io;
use thiserror::Error;

/// Result type for networking operations
pub type NetResult<T> = Result<T, NetError>;

/// Errors produced by transport handles, the packet codec and the poll loops
#[derive(Error, Debug)]
pub enum NetError {
    /// The remote end closed (or reset) the connection
    #[error("Connection closed by peer")]
    Disconnected,

    /// Any other I/O failure on an established endpoint
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Socket creation, option setting, bind or listen failed
    #[error("Couldn't bind listener to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Outbound connection attempt failed
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The address could not be turned into a socket address
    #[error("Couldn't resolve address {0}")]
    Resolve(String),

    /// Accept was called on a handle that is not a listener
    #[error("Accept called on a non-listening endpoint")]
    NotListener,

    /// Exact-length read/write was called on a listener
    #[error("Stream operation called on a listening endpoint")]
    NotConnected,

    /// The header carried a packet type this build does not know
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u8),

    /// A payload section does not fit the 16-bit length field
    #[error("{field} is {len} bytes, limit is {max}", max = u16::MAX)]
    PayloadTooLarge { field: &'static str, len: usize },
}

impl NetError {
    /// True when the remote end went away rather than something failing
    pub fn is_disconnect(&self) -> bool {
        matches!(self, NetError::Disconnected)
    }
}
