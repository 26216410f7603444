//! Process loop: one `ChatSession` per running `lanchat`
//!
//! A host owns both a `HostRelay` and a `PeerLoop` connected to it over loopback. A joiner owns
//! only the `PeerLoop`. Each iteration polls the peer, then the relay.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use super::frontend::{ChatFrontend, SessionObserver};
use super::peer_loop::PeerLoop;
use super::relay_loop::HostRelay;
use super::PollStatus;
use crate::config::Config;
use crate::core_net::{JoinTarget, NetResult, TransportHandle};
use crate::core_session::SessionState;
use crate::shutdown::{ShutdownListener, ShutdownReason};

/// Why `ChatSession::run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    HostGone,
    Shutdown(ShutdownReason),
}

pub struct ChatSession {
    peer: PeerLoop,
    relay: Option<HostRelay>,
    idle_backoff: Duration,
}

impl ChatSession {
    /// Start hosting on `config.network.listen_port`
    ///
    /// The host's own peer connects over loopback and becomes relay connection #0. It never sends
    /// Connect: the host's name goes into the roster directly and the front end is told here.
    pub async fn host<F>(config: &Config, name: impl Into<String>, frontend: &mut F) -> NetResult<Self>
    where
        F: SessionObserver + ?Sized,
    {
        let name = name.into();
        let network = &config.network;

        let mut relay = HostRelay::bind(network.listen_port, network.listen_backlog, network.relay_poll_timeout).await?;
        let port = relay.local_addr()?.port();

        let link = TransportHandle::connect(port, "localhost").await?;
        let loopback = relay.accept_next().await?;

        relay.session_mut().add_local_member(name.clone());
        frontend.on_member_joined(&name);
        info!(port, %name, %loopback, "hosting");

        Ok(Self {
            peer: PeerLoop::new(link, name),
            relay: Some(relay),
            idle_backoff: network.idle_backoff,
        })
    }

    /// Connect to a host and announce `name`
    pub async fn join(config: &Config, target: &JoinTarget, name: impl Into<String>) -> NetResult<Self> {
        let peer = PeerLoop::join(target, name).await?;

        Ok(Self {
            peer,
            relay: None,
            idle_backoff: config.network.idle_backoff,
        })
    }

    pub fn is_host(&self) -> bool {
        self.relay.is_some()
    }

    pub fn name(&self) -> &str {
        self.peer.name()
    }

    /// Listening address while hosting
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.relay.as_ref().and_then(|r| r.local_addr().ok())
    }

    /// Relay state while hosting
    pub fn session(&self) -> Option<&SessionState> {
        self.relay.as_ref().map(HostRelay::session)
    }

    pub fn relay(&self) -> Option<&HostRelay> {
        self.relay.as_ref()
    }

    /// One iteration: peer poll, then relay poll when hosting
    pub async fn tick<F>(&mut self, frontend: &mut F) -> NetResult<PollStatus>
    where
        F: ChatFrontend + ?Sized,
    {
        let peer = self.peer.poll(frontend).await;
        if let Ok(PollStatus::HostGone) = peer {
            return peer;
        }

        let relay = match self.relay.as_mut() {
            Some(relay) => relay.poll().await,
            None => Ok(PollStatus::Idle),
        };

        match (peer?, relay?) {
            (PollStatus::Idle, PollStatus::Idle) => Ok(PollStatus::Idle),
            _ => Ok(PollStatus::Ok),
        }
    }

    /// Iterate until the host goes away or a shutdown is requested
    ///
    /// A shutdown wins even while an iteration is blocked mid-read; the interrupted iteration is
    /// abandoned, so the session must be dropped once this returns `Shutdown`.
    pub async fn run<F>(&mut self, frontend: &mut F, shutdown: &mut ShutdownListener) -> SessionEnd
    where
        F: ChatFrontend + ?Sized,
    {
        tokio::select! {
            biased;
            reason = shutdown.wait() => {
                info!(?reason, "leaving session");
                SessionEnd::Shutdown(reason)
            }
            () = self.drive(frontend) => SessionEnd::HostGone,
        }
    }

    /// Tick forever, backing off when idle; returns only once the host is gone
    async fn drive<F>(&mut self, frontend: &mut F)
    where
        F: ChatFrontend + ?Sized,
    {
        loop {
            match self.tick(frontend).await {
                Ok(PollStatus::HostGone) => return,
                Ok(PollStatus::Ok) => {}
                Ok(PollStatus::Idle) => sleep(self.idle_backoff).await,
                Err(e) => {
                    warn!(error = %e, "poll failed");
                    sleep(self.idle_backoff).await;
                }
            }
        }
    }
}
