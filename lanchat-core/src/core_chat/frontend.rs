//! Boundary between the chat core and whatever renders it.

/// Notifications the core delivers to the user interface
///
/// Calls arrive in delivery order: a newcomer first receives every current member, then every
/// archived message, then live traffic.
pub trait SessionObserver {
    /// A member joined (or was already present when we joined)
    fn on_member_joined(&mut self, name: &str);

    /// Some other member left the session
    fn on_member_left(&mut self, name: &str);

    /// A chat message was delivered, including the echo of our own messages
    fn on_message(&mut self, sender: &str, text: &str);

    /// The connection to the host closed; the session is over
    fn on_peer_gone(&mut self);
}

/// A user interface that also produces outbound text
pub trait ChatFrontend: SessionObserver {
    /// Text typed since the last call, if any; polled once per peer-loop iteration
    fn take_pending_outbound_text(&mut self) -> Option<String>;
}
