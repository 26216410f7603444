//! Readiness multiplexing over the tokio reactor.
//!
//! `probe` answers "what is ready right now" for one connection without waiting.
//! `wait_ready` watches a listener plus any number of connections and returns as soon as
//! at least one is ready, or empty-handed once the limit elapses.

use std::future::poll_fn;
use std::task::{Context, Poll};
use std::time::Duration;

use tracing::warn;

use super::errors::NetResult;
use super::transport::TransportHandle;
use crate::metrics;

/// Directions a caller cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub read: bool,
    pub write: bool,
}

impl Interest {
    pub const READ: Interest = Interest { read: true, write: false };
}

/// Directions found ready on one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

impl Readiness {
    pub fn is_empty(&self) -> bool {
        !self.readable && !self.writable
    }
}

fn check(handle: &TransportHandle, interest: Interest, cx: &mut Context<'_>) -> NetResult<Readiness> {
    let mut ready = Readiness::default();
    if interest.read {
        if let Poll::Ready(result) = handle.poll_read_ready(cx) {
            result?;
            ready.readable = true;
        }
    }
    if interest.write {
        if let Poll::Ready(result) = handle.poll_write_ready(cx) {
            result?;
            ready.writable = true;
        }
    }
    Ok(ready)
}

/// Zero-timeout readiness check on a single connection
pub async fn probe(handle: &TransportHandle, interest: Interest) -> NetResult<Readiness> {
    poll_fn(|cx| Poll::Ready(check(handle, interest, cx))).await
}

/// Outcome of one bounded wait over a listener and its connections
#[derive(Debug)]
pub struct ReadySet<K> {
    /// Connection taken off the listener's queue, if one was waiting
    pub incoming: Option<TransportHandle>,
    /// Keys of connections with bytes (or a close) waiting
    pub readable: Vec<K>,
}

impl<K> ReadySet<K> {
    pub fn is_empty(&self) -> bool {
        self.incoming.is_none() && self.readable.is_empty()
    }
}

impl<K> Default for ReadySet<K> {
    fn default() -> Self {
        Self {
            incoming: None,
            readable: Vec::new(),
        }
    }
}

/// Wait up to `limit` for the listener or any connection to become read-ready
///
/// A failed accept or a failed check on one connection is logged and skipped; it never hides
/// the other connections that are ready in the same pass.
pub async fn wait_ready<K: Copy>(
    listener: &TransportHandle,
    connections: &[(K, &TransportHandle)],
    limit: Duration,
) -> ReadySet<K> {
    let ready = poll_fn(|cx| {
        let mut set = ReadySet::default();

        match listener.poll_accept(cx) {
            Poll::Ready(Ok(handle)) => set.incoming = Some(handle),
            Poll::Ready(Err(e)) => {
                metrics::accept_error();
                warn!(error = %e, "accept failed");
            }
            Poll::Pending => {}
        }

        for (key, handle) in connections {
            match check(handle, Interest::READ, cx) {
                Ok(ready) if ready.readable => set.readable.push(*key),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "readiness check failed"),
            }
        }

        if set.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(set)
        }
    });

    tokio::time::timeout(limit, ready).await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{loopback_client, loopback_listener};

    #[tokio::test]
    async fn test_probe_idle_connection() {
        let (listener, target) = loopback_listener().await;
        let client = loopback_client(&target).await;
        let _server = listener.accept().await.unwrap();

        let ready = probe(&client, Interest::READ).await.unwrap();
        assert!(ready.is_empty());
    }

    #[tokio::test]
    async fn test_probe_sees_pending_bytes() {
        let (listener, target) = loopback_listener().await;
        let client = loopback_client(&target).await;
        let mut server = listener.accept().await.unwrap();

        server.write_exact(b"ping").await.unwrap();

        let mut ready = Readiness::default();
        for _ in 0..100 {
            ready = probe(&client, Interest::READ).await.unwrap();
            if ready.readable {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(ready.readable);
        assert!(!ready.writable, "write interest was not requested");
    }

    #[tokio::test]
    async fn test_probe_not_readable_after_frame_consumed() {
        let (listener, target) = loopback_listener().await;
        let mut client = loopback_client(&target).await;
        let mut server = listener.accept().await.unwrap();

        server.write_exact(b"abc").await.unwrap();
        assert_eq!(client.read_exact(3).await.unwrap(), b"abc");

        let ready = probe(&client, Interest::READ).await.unwrap();
        assert!(!ready.readable);
    }

    #[tokio::test]
    async fn test_wait_ready_times_out_empty() {
        let (listener, target) = loopback_listener().await;
        let _client = loopback_client(&target).await;
        let server = listener.accept().await.unwrap();

        let set = wait_ready(&listener, &[(1u64, &server)], Duration::from_millis(20)).await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_wait_ready_reports_incoming_and_readable() {
        let (listener, target) = loopback_listener().await;
        let mut first = loopback_client(&target).await;
        let server = listener.accept().await.unwrap();

        first.write_exact(b"x").await.unwrap();
        let _second = loopback_client(&target).await;

        let mut saw_incoming = false;
        let mut saw_readable = false;
        for _ in 0..50 {
            let set = wait_ready(&listener, &[(7u64, &server)], Duration::from_millis(20)).await;
            saw_incoming |= set.incoming.is_some();
            saw_readable |= set.readable == vec![7u64];
            if saw_incoming && saw_readable {
                break;
            }
        }
        assert!(saw_incoming);
        assert!(saw_readable);
    }

    #[tokio::test]
    async fn test_failed_accept_still_reports_readable_connections() {
        let (listener, target) = loopback_listener().await;
        let mut client = loopback_client(&target).await;
        let server = listener.accept().await.unwrap();
        client.write_exact(b"x").await.unwrap();

        // A connected handle in the listener slot fails every accept.
        let broken_listener = loopback_client(&target).await;

        let mut readable = Vec::new();
        for _ in 0..50 {
            let set = wait_ready(&broken_listener, &[(3u64, &server)], Duration::from_millis(20)).await;
            assert!(set.incoming.is_none());
            readable = set.readable;
            if !readable.is_empty() {
                break;
            }
        }
        assert_eq!(readable, vec![3u64]);
    }

    #[tokio::test]
    async fn test_failed_check_skips_only_that_connection() {
        let (listener, target) = loopback_listener().await;
        let mut client = loopback_client(&target).await;
        let server = listener.accept().await.unwrap();
        client.write_exact(b"x").await.unwrap();

        // Read checks on a listener fail; the stream next to it is still reported.
        let (other_listener, _) = loopback_listener().await;

        let mut readable = Vec::new();
        for _ in 0..50 {
            readable = wait_ready(&listener, &[(1u64, &other_listener), (2u64, &server)], Duration::from_millis(20))
                .await
                .readable;
            if !readable.is_empty() {
                break;
            }
        }
        assert_eq!(readable, vec![2u64]);
    }
}
