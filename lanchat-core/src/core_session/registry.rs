//! Connection registry: which name each relay connection announced

use std::collections::HashMap;
use std::fmt;

/// Relay-assigned identifier of an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    names: HashMap<ConnectionId, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a name with a connection, replacing any earlier one
    pub fn record(&mut self, id: ConnectionId, name: impl Into<String>) -> Option<String> {
        self.names.insert(id, name.into())
    }

    pub fn name_of(&self, id: ConnectionId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn forget(&mut self, id: ConnectionId) -> Option<String> {
        self.names.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
