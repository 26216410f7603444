//! Host-side session state: roster, archive and connection registry together.

use tracing::{debug, warn};

use super::archive::Archive;
use super::registry::{ConnectionId, ConnectionRegistry};
use super::roster::Roster;
use crate::core_net::{ChatMessage, Packet, PacketType};

/// Everything a newcomer needs to catch up, plus who is behind each connection
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    roster: Roster,
    archive: Archive,
    registry: ConnectionRegistry,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member that has no relay connection of its own (the host)
    pub fn add_local_member(&mut self, name: impl Into<String>) {
        self.roster.push(name);
    }

    /// A connection announced its name
    pub fn member_joined(&mut self, id: ConnectionId, name: &str) {
        if let Some(previous) = self.registry.record(id, name) {
            warn!(%id, %previous, name, "connection announced a second name");
        }
        self.roster.push(name);
        debug!(%id, name, members = self.roster.len(), "member joined");
    }

    pub fn message_received(&mut self, message: ChatMessage) {
        self.archive.append(message);
    }

    /// Forget a closed connection; returns the name it had announced, if any
    ///
    /// The name's first roster entry is removed; connections that never announced a name leave
    /// the roster untouched.
    pub fn connection_closed(&mut self, id: ConnectionId) -> Option<String> {
        let name = self.registry.forget(id)?;
        if !self.roster.remove(&name) {
            warn!(%id, %name, "departing member was not on the roster");
        }
        debug!(%id, %name, members = self.roster.len(), "member left");
        Some(name)
    }

    /// Packets that bring a newcomer up to date: every member, then every message
    pub fn replay_packets(&self) -> impl Iterator<Item = Packet> + '_ {
        let members = self
            .roster
            .iter()
            .map(|name| Packet::new(PacketType::Connect, Vec::<u8>::new(), name.as_bytes()));
        let messages = self.archive.iter().map(ChatMessage::to_packet);
        members.chain(messages)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}
