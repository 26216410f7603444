/*
  HostRelay - the hosting process's broadcast point

  Holds the listening endpoint, every accepted connection and the SessionState. Runs once per
  process-loop iteration, after the host's own PeerLoop.

  Workflow per iteration:
  1. Wait (bounded by poll_timeout) until the listener or any connection is read-ready.
  2. Incoming connection -> add it to the set, then replay the session to it:
       Connect for every roster name (roster order), then ChatMessage for every archived
       message (archive order). The newcomer sees full history before any live broadcast.
  3. Each readable connection -> decode one packet:
       ChatMessage -> archive it, broadcast to every connection (sender included)
       Connect     -> roster + registry, broadcast to every connection
       orderly close -> drop the connection, remove its name, broadcast Disconnect(name)
                        to the remaining connections
     Other failures are logged and the pass continues with the next connection.

┌──────────────┐   accept + replay   ┌────────────────────────────┐
│   Listener   │───────────────────► │ connections: Vec<(id, h)>  │
└──────────────┘                     │  #0 host loopback peer     │
                                     │  #1 Ann   #2 Bob   ...     │
                                     └─────────────┬──────────────┘
                                                   │ decode
                                     ┌─────────────▼──────────────┐
                                     │ SessionState               │
                                     │ roster / archive / registry│
                                     └─────────────┬──────────────┘
                                                   │ broadcast
                                                   ▼
                                         every connection in the set
*/

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::PollStatus;
use crate::core_net::{decode, wait_ready, NetError, NetResult, Packet, PacketType, Role, TransportHandle};
use crate::core_session::{ConnectionId, SessionState};
use crate::metrics;

struct RelayConnection {
    id: ConnectionId,
    handle: TransportHandle,
}

pub struct HostRelay {
    listener: TransportHandle,
    connections: Vec<RelayConnection>,
    session: SessionState,
    next_id: u64,
    poll_timeout: Duration,
}

impl HostRelay {
    /// Build a relay around an existing listener
    pub fn new(listener: TransportHandle, poll_timeout: Duration) -> NetResult<Self> {
        if listener.role() != Role::Listener {
            return Err(NetError::NotListener);
        }

        Ok(Self {
            listener,
            connections: Vec::new(),
            session: SessionState::new(),
            next_id: 0,
            poll_timeout,
        })
    }

    /// Listen on every interface at `port`
    pub async fn bind(port: u16, backlog: u32, poll_timeout: Duration) -> NetResult<Self> {
        let listener = TransportHandle::listen(port, "localhost", backlog).await?;
        Self::new(listener, poll_timeout)
    }

    pub fn local_addr(&self) -> NetResult<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Wait for the next connection and admit it outside the poll loop
    pub async fn accept_next(&mut self) -> NetResult<ConnectionId> {
        let handle = self.listener.accept().await?;
        Ok(self.admit(handle).await)
    }

    pub async fn poll(&mut self) -> NetResult<PollStatus> {
        let watched: Vec<(ConnectionId, &TransportHandle)> =
            self.connections.iter().map(|c| (c.id, &c.handle)).collect();
        let ready = wait_ready(&self.listener, &watched, self.poll_timeout).await;
        drop(watched);

        if ready.is_empty() {
            return Ok(PollStatus::Idle);
        }

        if let Some(handle) = ready.incoming {
            self.admit(handle).await;
        }

        // Ids, not indices: a connection closing mid-pass shifts the ones after it.
        for id in ready.readable {
            self.service(id).await;
        }

        Ok(PollStatus::Ok)
    }

    /// Add a connection to the set and replay the session to it
    async fn admit(&mut self, handle: TransportHandle) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let remote = handle.peer_addr().ok();
        self.connections.push(RelayConnection { id, handle });
        metrics::connection_accepted(self.connections.len());
        info!(%id, ?remote, connections = self.connections.len(), "connection accepted");

        let Self { connections, session, .. } = self;
        if let Some(conn) = connections.last_mut() {
            let mut replayed = 0usize;
            for packet in session.replay_packets() {
                if let Err(e) = packet.send(&mut conn.handle).await {
                    warn!(%id, error = %e, "replay interrupted");
                    break;
                }
                replayed += 1;
            }
            debug!(%id, replayed, "session replayed");
        }

        id
    }

    /// Decode one packet from a read-ready connection and react to it
    async fn service(&mut self, id: ConnectionId) {
        let Some(index) = self.connections.iter().position(|c| c.id == id) else {
            return;
        };

        let packet = match decode(&mut self.connections[index].handle).await {
            Ok(packet) => packet,
            Err(NetError::Disconnected) => {
                self.close(index).await;
                return;
            }
            Err(e) => {
                metrics::receive_error();
                warn!(%id, error = %e, "packet reception failed");
                return;
            }
        };

        metrics::packet_received(packet.packet_type);
        match packet.packet_type {
            PacketType::ChatMessage => {
                self.session.message_received(packet.clone().into_message());
                self.broadcast(&packet).await;
            }
            PacketType::Connect => {
                let name = packet.sender_lossy();
                self.session.member_joined(id, &name);
                info!(%id, %name, "member joined");
                self.broadcast(&packet).await;
            }
            PacketType::Disconnect => {
                warn!(%id, "ignoring disconnect packet from a peer");
            }
        }
    }

    /// Drop a closed connection and tell everyone else who left
    async fn close(&mut self, index: usize) {
        let conn = self.connections.remove(index);
        let id = conn.id;
        drop(conn);
        metrics::connection_closed(self.connections.len());

        match self.session.connection_closed(id) {
            Some(name) => {
                info!(%id, %name, "member left");
                let notice = Packet::new(PacketType::Disconnect, Vec::<u8>::new(), name.into_bytes());
                self.broadcast(&notice).await;
            }
            None => debug!(%id, "unnamed connection closed"),
        }
    }

    /// Send one packet to every connection in the set; returns how many writes succeeded
    pub async fn broadcast(&mut self, packet: &Packet) -> usize {
        let mut delivered = 0;
        for conn in self.connections.iter_mut() {
            match packet.send(&mut conn.handle).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(id = %conn.id, error = %e, "broadcast write failed"),
            }
        }
        metrics::packets_broadcast(delivered);
        debug!(packet_type = %packet.packet_type, delivered, "broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_net::{encode, ChatMessage, JoinTarget};
    use crate::test_utils::{loopback_client, loopback_listener};
    use tokio::time::{sleep, timeout};

    const TICK: Duration = Duration::from_millis(10);

    async fn relay() -> (HostRelay, JoinTarget) {
        let (listener, target) = loopback_listener().await;
        (HostRelay::new(listener, TICK).unwrap(), target)
    }

    /// Poll the relay until `done` holds
    async fn poll_until(relay: &mut HostRelay, mut done: impl FnMut(&HostRelay) -> bool) {
        for _ in 0..300 {
            if done(relay) {
                return;
            }
            relay.poll().await.unwrap();
        }
        panic!("relay never reached the expected state");
    }

    async fn next_packet(handle: &mut TransportHandle) -> Packet {
        timeout(Duration::from_secs(2), decode(handle))
            .await
            .expect("Timeout waiting for packet")
            .expect("decode failed")
    }

    #[tokio::test]
    async fn test_new_requires_listener() {
        let (relay, target) = relay().await;
        let stream = loopback_client(&target).await;
        assert!(matches!(HostRelay::new(stream, TICK), Err(NetError::NotListener)));
        drop(relay);
    }

    #[tokio::test]
    async fn test_idle_without_traffic() {
        let (mut relay, _target) = relay().await;
        assert_eq!(relay.poll().await.unwrap(), PollStatus::Idle);
        assert_eq!(relay.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_is_recorded_and_echoed() {
        let (mut relay, target) = relay().await;
        let mut ann = loopback_client(&target).await;
        encode(&mut ann, PacketType::Connect, b"", b"Ann").await.unwrap();

        poll_until(&mut relay, |r| r.session().roster().len() == 1).await;

        assert_eq!(relay.session().roster().members(), ["Ann"]);
        assert_eq!(relay.session().registry().name_of(ConnectionId(0)), Some("Ann"));

        let echo = next_packet(&mut ann).await;
        assert_eq!(echo, Packet::new(PacketType::Connect, b"".to_vec(), b"Ann".to_vec()));
    }

    #[tokio::test]
    async fn test_chat_message_broadcast_reaches_every_connection() {
        let (mut relay, target) = relay().await;
        let mut peers = Vec::new();
        for _ in 0..3 {
            peers.push(loopback_client(&target).await);
        }
        poll_until(&mut relay, |r| r.connection_count() == 3).await;

        encode(&mut peers[1], PacketType::ChatMessage, b"hello all", b"Bob").await.unwrap();
        poll_until(&mut relay, |r| r.session().archive().len() == 1).await;

        // The sender gets its own message back as well.
        for peer in peers.iter_mut() {
            let packet = next_packet(peer).await;
            assert_eq!(packet, Packet::new(PacketType::ChatMessage, b"hello all".to_vec(), b"Bob".to_vec()));
        }
        assert_eq!(relay.session().archive().messages(), [ChatMessage::new("Bob", "hello all")]);
    }

    #[tokio::test]
    async fn test_broadcast_counts_one_write_per_connection() {
        let (mut relay, target) = relay().await;
        let mut peers = Vec::new();
        for _ in 0..4 {
            peers.push(loopback_client(&target).await);
        }
        poll_until(&mut relay, |r| r.connection_count() == 4).await;

        let packet = Packet::new(PacketType::ChatMessage, b"x".to_vec(), b"host".to_vec());
        assert_eq!(relay.broadcast(&packet).await, 4);

        for peer in peers.iter_mut() {
            assert_eq!(next_packet(peer).await, packet);
        }
    }

    #[tokio::test]
    async fn test_replay_to_newcomer() {
        let (mut relay, target) = relay().await;
        relay.session_mut().add_local_member("host");

        let mut ann = loopback_client(&target).await;
        encode(&mut ann, PacketType::Connect, b"", b"Ann").await.unwrap();
        encode(&mut ann, PacketType::ChatMessage, b"first", b"Ann").await.unwrap();
        poll_until(&mut relay, |r| r.session().archive().len() == 1).await;

        let mut bob = loopback_client(&target).await;
        poll_until(&mut relay, |r| r.connection_count() == 2).await;

        let replay = [next_packet(&mut bob).await, next_packet(&mut bob).await, next_packet(&mut bob).await];
        assert_eq!(replay[0], Packet::new(PacketType::Connect, b"".to_vec(), b"host".to_vec()));
        assert_eq!(replay[1], Packet::new(PacketType::Connect, b"".to_vec(), b"Ann".to_vec()));
        assert_eq!(replay[2], Packet::new(PacketType::ChatMessage, b"first".to_vec(), b"Ann".to_vec()));
    }

    #[tokio::test]
    async fn test_close_removes_member_and_notifies_others() {
        let (mut relay, target) = relay().await;
        let mut ann = loopback_client(&target).await;
        let mut bob = loopback_client(&target).await;
        encode(&mut ann, PacketType::Connect, b"", b"Ann").await.unwrap();
        poll_until(&mut relay, |r| r.session().roster().len() == 1).await;
        encode(&mut bob, PacketType::Connect, b"", b"Bob").await.unwrap();
        poll_until(&mut relay, |r| r.session().roster().len() == 2).await;

        // Bob sees Ann's join broadcast and his own.
        assert_eq!(next_packet(&mut bob).await.sender, b"Ann");
        assert_eq!(next_packet(&mut bob).await.sender, b"Bob");

        drop(ann);
        poll_until(&mut relay, |r| r.connection_count() == 1).await;

        assert_eq!(relay.session().roster().members(), ["Bob"]);
        let notice = next_packet(&mut bob).await;
        assert_eq!(notice, Packet::new(PacketType::Disconnect, b"".to_vec(), b"Ann".to_vec()));
    }

    #[tokio::test]
    async fn test_silent_connection_close_broadcasts_nothing() {
        let (mut relay, target) = relay().await;
        let silent = loopback_client(&target).await;
        let watcher = loopback_client(&target).await;
        poll_until(&mut relay, |r| r.connection_count() == 2).await;

        drop(silent);
        poll_until(&mut relay, |r| r.connection_count() == 1).await;

        // Nothing was queued for the watcher.
        sleep(Duration::from_millis(20)).await;
        let ready = crate::core_net::probe(&watcher, crate::core_net::Interest::READ).await.unwrap();
        assert!(!ready.readable);
        assert!(relay.session().roster().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_packet_from_peer_is_ignored() {
        let (mut relay, target) = relay().await;
        let mut ann = loopback_client(&target).await;
        encode(&mut ann, PacketType::Connect, b"", b"Ann").await.unwrap();
        poll_until(&mut relay, |r| r.session().roster().len() == 1).await;

        encode(&mut ann, PacketType::Disconnect, b"", b"Ann").await.unwrap();
        for _ in 0..10 {
            relay.poll().await.unwrap();
        }
        assert_eq!(relay.session().roster().members(), ["Ann"]);
        assert_eq!(relay.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_accept_next_replays_immediately() {
        let (mut relay, target) = relay().await;
        relay.session_mut().add_local_member("host");

        let mut client = loopback_client(&target).await;
        let id = relay.accept_next().await.unwrap();
        assert_eq!(id, ConnectionId(0));

        let packet = next_packet(&mut client).await;
        assert_eq!(packet.sender, b"host");
    }
}
