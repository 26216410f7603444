//! Fixtures for loopback networking tests

use crate::config::Config;
use crate::core_net::{JoinTarget, Role, TransportHandle};

/// Names handed out to simulated peers, in join order
pub const PEER_NAMES: [&str; 8] = ["Ann", "Bob", "Cid", "Dee", "Eve", "Fay", "Gus", "Hal"];

/// Listener on an ephemeral loopback port, plus the target peers should join
pub async fn loopback_listener() -> (TransportHandle, JoinTarget) {
    let listener = TransportHandle::create(Role::Listener, 0, "127.0.0.1")
        .await
        .expect("Failed to bind loopback listener");
    let port = listener.local_addr().expect("listener has no address").port();
    (listener, JoinTarget::new("127.0.0.1", port))
}

/// Stream connected to `target`
pub async fn loopback_client(target: &JoinTarget) -> TransportHandle {
    TransportHandle::create(Role::Connected, target.port, &target.address)
        .await
        .expect("Failed to connect loopback client")
}

/// Configuration for hosting on an ephemeral port with short timeouts
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.network.listen_port = 0;
    config.network.relay_poll_timeout = std::time::Duration::from_millis(5);
    config.network.idle_backoff = std::time::Duration::from_millis(2);
    config
}

/// First `n` peer names, cycling with a numeric suffix past the fixed list
pub fn peer_names(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match PEER_NAMES.get(i) {
            Some(name) => name.to_string(),
            None => format!("{}{}", PEER_NAMES[i % PEER_NAMES.len()], i / PEER_NAMES.len()),
        })
        .collect()
}
