/*
  PeerLoop - every participant's single connection to the host

  Runs once per process-loop iteration. Never waits for the network: the readiness check has a
  zero timeout, so an iteration with nothing to do returns Idle immediately.

  Workflow per iteration:
  1. Ask the front end for pending outbound text (once) and queue it.
  2. Probe the connection: read interest always, write interest while text is queued.
  3. Readable -> decode one packet and hand it to the front end:
       Connect     -> on_member_joined(sender)
       ChatMessage -> on_message(sender, text)
       Disconnect  -> on_member_left(sender)
     An orderly close means the host went away -> on_peer_gone(), HostGone.
  4. Writable -> send every queued text as a ChatMessage signed with our display name.

  Failures other than the host closing are logged and the loop carries on next iteration.
*/

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::frontend::ChatFrontend;
use super::PollStatus;
use crate::core_net::{
    decode, encode, probe, Interest, JoinTarget, NetError, NetResult, Packet, PacketType, TransportHandle,
};

pub struct PeerLoop {
    link: TransportHandle,
    name: String,
    outbox: VecDeque<String>,
}

impl PeerLoop {
    /// Wrap an already connected handle without announcing anything
    pub fn new(link: TransportHandle, name: impl Into<String>) -> Self {
        Self {
            link,
            name: name.into(),
            outbox: VecDeque::new(),
        }
    }

    /// Connect to a host and announce our display name with a Connect packet
    pub async fn join(target: &JoinTarget, name: impl Into<String>) -> NetResult<Self> {
        let link = TransportHandle::connect(target.port, &target.address).await?;
        let mut peer = Self::new(link, name);
        encode(&mut peer.link, PacketType::Connect, b"", peer.name.as_bytes()).await?;
        info!(%target, name = %peer.name, "joined host");
        Ok(peer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texts taken from the front end but not yet written
    pub fn pending_outbound(&self) -> usize {
        self.outbox.len()
    }

    pub async fn poll<F>(&mut self, frontend: &mut F) -> NetResult<PollStatus>
    where
        F: ChatFrontend + ?Sized,
    {
        if let Some(text) = frontend.take_pending_outbound_text() {
            if !text.is_empty() {
                self.outbox.push_back(text);
            }
        }

        let interest = Interest {
            read: true,
            write: !self.outbox.is_empty(),
        };
        let ready = probe(&self.link, interest).await?;
        if ready.is_empty() {
            return Ok(PollStatus::Idle);
        }

        if ready.readable {
            match decode(&mut self.link).await {
                Ok(packet) => dispatch(packet, frontend),
                Err(NetError::Disconnected) => {
                    info!("host closed the connection");
                    frontend.on_peer_gone();
                    return Ok(PollStatus::HostGone);
                }
                Err(e) => warn!(error = %e, "packet reception failed"),
            }
        }

        if ready.writable {
            self.flush_outbox().await;
        }

        Ok(PollStatus::Ok)
    }

    async fn flush_outbox(&mut self) {
        while let Some(text) = self.outbox.pop_front() {
            match encode(&mut self.link, PacketType::ChatMessage, text.as_bytes(), self.name.as_bytes()).await {
                Ok(()) => debug!(len = text.len(), "message sent"),
                // The read side notices the close on the next iteration.
                Err(NetError::Disconnected) => {
                    warn!("host closed the connection while sending");
                    return;
                }
                Err(e) => warn!(error = %e, "dropping outbound message"),
            }
        }
    }
}

fn dispatch<F>(packet: Packet, frontend: &mut F)
where
    F: ChatFrontend + ?Sized,
{
    match packet.packet_type {
        PacketType::Connect => frontend.on_member_joined(&packet.sender_lossy()),
        PacketType::Disconnect => frontend.on_member_left(&packet.sender_lossy()),
        PacketType::ChatMessage => {
            let message = packet.into_message();
            frontend.on_message(&message.sender, &message.text);
        }
    }
}
