//! Append-only message archive

use crate::core_net::ChatMessage;

/// Every chat message the host has relayed, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    messages: Vec<ChatMessage>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
