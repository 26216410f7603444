//! Front end that records observer calls

use std::collections::VecDeque;

use crate::core_chat::{ChatFrontend, SessionObserver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    MemberJoined(String),
    MemberLeft(String),
    Message { sender: String, text: String },
    PeerGone,
}

/// Records every notification and serves queued outbound text one line per poll
#[derive(Debug, Default)]
pub struct RecordingFrontend {
    events: Vec<ObservedEvent>,
    outbound: VecDeque<String>,
}

impl RecordingFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line as if the user had typed it
    pub fn queue_text(&mut self, text: &str) {
        self.outbound.push_back(text.to_string());
    }

    pub fn has_queued_text(&self) -> bool {
        !self.outbound.is_empty()
    }

    pub fn events(&self) -> &[ObservedEvent] {
        &self.events
    }

    /// `(sender, text)` of every message seen, in order
    pub fn messages(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::Message { sender, text } => Some((sender.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn joined(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::MemberJoined(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn left(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ObservedEvent::MemberLeft(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn saw_peer_gone(&self) -> bool {
        self.events.contains(&ObservedEvent::PeerGone)
    }
}

impl SessionObserver for RecordingFrontend {
    fn on_member_joined(&mut self, name: &str) {
        self.events.push(ObservedEvent::MemberJoined(name.to_string()));
    }

    fn on_member_left(&mut self, name: &str) {
        self.events.push(ObservedEvent::MemberLeft(name.to_string()));
    }

    fn on_message(&mut self, sender: &str, text: &str) {
        self.events.push(ObservedEvent::Message {
            sender: sender.to_string(),
            text: text.to_string(),
        });
    }

    fn on_peer_gone(&mut self) {
        self.events.push(ObservedEvent::PeerGone);
    }
}

impl ChatFrontend for RecordingFrontend {
    fn take_pending_outbound_text(&mut self) -> Option<String> {
        self.outbound.pop_front()
    }
}
