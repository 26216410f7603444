//! Relay metrics recorded through the `metrics` facade
//!
//! No recorder is installed by this crate; embedders that want the numbers install one
//! (Prometheus exporter, test recorder, ...) before starting a session.

use metrics::{counter, describe_counter, describe_gauge, gauge};

use crate::core_net::PacketType;

pub const CONNECTIONS_ACCEPTED: &str = "lanchat_relay_connections_accepted_total";
pub const PACKETS_RECEIVED: &str = "lanchat_relay_packets_received_total";
pub const PACKETS_BROADCAST: &str = "lanchat_relay_packets_broadcast_total";
pub const DISCONNECTS: &str = "lanchat_relay_disconnects_total";
pub const RECEIVE_ERRORS: &str = "lanchat_relay_receive_errors_total";
pub const ACCEPT_ERRORS: &str = "lanchat_relay_accept_errors_total";
pub const ACTIVE_CONNECTIONS: &str = "lanchat_relay_connections";

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    describe_counter!(CONNECTIONS_ACCEPTED, "Connections accepted by the host relay");
    describe_counter!(
        PACKETS_RECEIVED,
        "Packets decoded by the host relay, labeled by packet type"
    );
    describe_counter!(
        PACKETS_BROADCAST,
        "Packets written by relay broadcasts, one per receiving connection"
    );
    describe_counter!(DISCONNECTS, "Relay connections closed by their peer");
    describe_counter!(RECEIVE_ERRORS, "Relay receive failures other than an orderly close");
    describe_counter!(ACCEPT_ERRORS, "Failed accepts on the relay listener");
    describe_gauge!(ACTIVE_CONNECTIONS, "Connections currently held by the relay");
}

pub fn connection_accepted(active: usize) {
    counter!(CONNECTIONS_ACCEPTED).increment(1);
    gauge!(ACTIVE_CONNECTIONS).set(active as f64);
}

pub fn connection_closed(active: usize) {
    counter!(DISCONNECTS).increment(1);
    gauge!(ACTIVE_CONNECTIONS).set(active as f64);
}

pub fn packet_received(packet_type: PacketType) {
    counter!(PACKETS_RECEIVED, "type" => packet_type.as_str()).increment(1);
}

pub fn packets_broadcast(count: usize) {
    counter!(PACKETS_BROADCAST).increment(count as u64);
}

pub fn receive_error() {
    counter!(RECEIVE_ERRORS).increment(1);
}

pub fn accept_error() {
    counter!(ACCEPT_ERRORS).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        init_metrics();
        // No recorder installed: recording must still be a harmless no-op
        connection_accepted(1);
        packet_received(PacketType::ChatMessage);
        packets_broadcast(3);
        receive_error();
        accept_error();
        connection_closed(0);
    }
}
