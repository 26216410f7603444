/*
  TransportHandle - one owned TCP endpoint

  Wraps either a listening socket or a connected stream. The handle is the only owner of its
  descriptor: it is not Clone, moving it transfers ownership, and dropping it closes the socket.

  Inputs:
    - create(role, port, address) -> listener bound to address:port, or stream connected to it
    - accept() -> new Connected handle (listeners only)
    - write_exact(bytes) / read_exact(n) -> full-length transfers (connected handles only)

  Outputs:
    - Ok when every byte moved
    - NetError::Disconnected when the remote end closed or reset the connection
    - NetError::Io for anything else

  Important:
  The literal address "localhost" means the loopback address for a connection and the
  unspecified ("any") address for a listener.

┌───────────────────────────────┐        ┌───────────────────────────────┐
│  TransportHandle (Listener)   │ accept │  TransportHandle (Connected)  │
│  TcpSocket + SO_REUSEADDR     │──────► │  TcpStream                    │
│  listen(backlog)              │        │  write_exact / read_exact     │
└───────────────────────────────┘        └───────────────────────────────┘
*/

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::task::{Context, Poll};

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadBuf};
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tracing::{debug, trace};

use super::errors::{NetError, NetResult};

/// Backlog used when no explicit value is configured
pub const DEFAULT_BACKLOG: u32 = 1024;

/// Which side of a TCP conversation a handle represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Listener,
    Connected,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Listener => write!(f, "listener"),
            Role::Connected => write!(f, "connected"),
        }
    }
}

enum Endpoint {
    Listener(TcpListener),
    Stream(TcpStream),
}

/// Owning handle over one listening or connected TCP endpoint
pub struct TransportHandle {
    endpoint: Endpoint,
}

impl TransportHandle {
    /// Create a listener bound to `address:port` or a stream connected to it
    pub async fn create(role: Role, port: u16, address: &str) -> NetResult<Self> {
        match role {
            Role::Listener => Self::listen(port, address, DEFAULT_BACKLOG).await,
            Role::Connected => Self::connect(port, address).await,
        }
    }

    /// Bind and listen with an explicit backlog
    pub async fn listen(port: u16, address: &str, backlog: u32) -> NetResult<Self> {
        let addr = resolve(Role::Listener, port, address).await?;
        let bind_err = |source: io::Error| NetError::Bind { addr: addr.to_string(), source };

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(backlog).map_err(bind_err)?;

        debug!(%addr, backlog, "listening");
        Ok(Self { endpoint: Endpoint::Listener(listener) })
    }

    /// Connect to `address:port`
    pub async fn connect(port: u16, address: &str) -> NetResult<Self> {
        let addr = resolve(Role::Connected, port, address).await?;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| NetError::Connect { addr: addr.to_string(), source })?;
        // Packets are small and written piecewise; don't let Nagle hold them back.
        stream.set_nodelay(true)?;

        debug!(%addr, "connected");
        Ok(Self { endpoint: Endpoint::Stream(stream) })
    }

    pub fn role(&self) -> Role {
        match self.endpoint {
            Endpoint::Listener(_) => Role::Listener,
            Endpoint::Stream(_) => Role::Connected,
        }
    }

    pub fn local_addr(&self) -> NetResult<SocketAddr> {
        let addr = match &self.endpoint {
            Endpoint::Listener(listener) => listener.local_addr()?,
            Endpoint::Stream(stream) => stream.local_addr()?,
        };
        Ok(addr)
    }

    /// Remote address of a connected handle
    pub fn peer_addr(&self) -> NetResult<SocketAddr> {
        Ok(self.stream()?.peer_addr()?)
    }

    /// Poll for an incoming connection without blocking
    pub fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<NetResult<TransportHandle>> {
        let listener = match &self.endpoint {
            Endpoint::Listener(listener) => listener,
            Endpoint::Stream(_) => return Poll::Ready(Err(NetError::NotListener)),
        };

        match listener.poll_accept(cx) {
            Poll::Ready(Ok((stream, remote))) => {
                trace!(%remote, "accepted");
                if let Err(e) = stream.set_nodelay(true) {
                    return Poll::Ready(Err(e.into()));
                }
                Poll::Ready(Ok(TransportHandle { endpoint: Endpoint::Stream(stream) }))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e.into())),
            Poll::Pending => Poll::Pending,
        }
    }

    /// Wait for the next incoming connection
    pub async fn accept(&self) -> NetResult<TransportHandle> {
        std::future::poll_fn(|cx| self.poll_accept(cx)).await
    }

    /// Ready once bytes, an orderly close or a socket error are waiting to be read
    ///
    /// Peeks a single byte instead of trusting cached reactor readiness, which stays set after a
    /// frame has been fully consumed and would make the following read block.
    pub fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<NetResult<()>> {
        let stream = match &self.endpoint {
            Endpoint::Stream(stream) => stream,
            Endpoint::Listener(_) => return Poll::Ready(Err(NetError::NotConnected)),
        };

        let mut byte = [0u8; 1];
        let mut buf = ReadBuf::new(&mut byte);
        match stream.poll_peek(cx, &mut buf) {
            // Data, EOF or a pending error: the next read tells which.
            Poll::Ready(_) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }

    pub fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<NetResult<()>> {
        match &self.endpoint {
            Endpoint::Stream(stream) => stream.poll_write_ready(cx).map_err(NetError::from),
            Endpoint::Listener(_) => Poll::Ready(Err(NetError::NotConnected)),
        }
    }

    /// Write the whole buffer, looping over partial writes
    pub async fn write_exact(&mut self, bytes: &[u8]) -> NetResult<()> {
        let stream = self.stream_mut()?;
        let mut sent = 0;
        while sent < bytes.len() {
            match stream.write(&bytes[sent..]).await {
                Ok(0) => return Err(NetError::Disconnected),
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Read exactly `n` bytes into a freshly sized buffer
    ///
    /// End of stream and connection resets both surface as `Disconnected`.
    pub async fn read_exact(&mut self, n: usize) -> NetResult<Vec<u8>> {
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; n];
        let mut received = 0;
        while received < n {
            match stream.read(&mut buf[received..]).await {
                Ok(0) => return Err(NetError::Disconnected),
                Ok(count) => received += count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // A peer that closes with unread data resets instead of sending FIN.
                Err(e) if matches!(e.kind(), io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted) => {
                    return Err(NetError::Disconnected)
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf)
    }

    fn stream(&self) -> NetResult<&TcpStream> {
        match &self.endpoint {
            Endpoint::Stream(stream) => Ok(stream),
            Endpoint::Listener(_) => Err(NetError::NotConnected),
        }
    }

    fn stream_mut(&mut self) -> NetResult<&mut TcpStream> {
        match &mut self.endpoint {
            Endpoint::Stream(stream) => Ok(stream),
            Endpoint::Listener(_) => Err(NetError::NotConnected),
        }
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("role", &self.role())
            .field("local_addr", &self.local_addr().ok())
            .finish()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        trace!(role = %self.role(), "closing endpoint");
    }
}

/// Turn a user-facing address into a socket address for the given role
async fn resolve(role: Role, port: u16, address: &str) -> NetResult<SocketAddr> {
    if address == "localhost" {
        let ip = match role {
            Role::Listener => Ipv4Addr::UNSPECIFIED,
            Role::Connected => Ipv4Addr::LOCALHOST,
        };
        return Ok(SocketAddr::from((ip, port)));
    }

    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    lookup_host((address, port))
        .await
        .map_err(|_| NetError::Resolve(address.to_string()))?
        .next()
        .ok_or_else(|| NetError::Resolve(address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    async fn connected_pair() -> (TransportHandle, TransportHandle, TransportHandle) {
        let listener = TransportHandle::create(Role::Listener, 0, "127.0.0.1")
            .await
            .expect("Failed to create listener");
        let port = listener.local_addr().unwrap().port();

        let client = TransportHandle::create(Role::Connected, port, "localhost")
            .await
            .expect("Failed to connect");
        let server = listener.accept().await.expect("Failed to accept");

        (listener, client, server)
    }

    #[tokio::test]
    async fn test_localhost_resolution() {
        let listen = resolve(Role::Listener, 6969, "localhost").await.unwrap();
        assert_eq!(listen, "0.0.0.0:6969".parse::<SocketAddr>().unwrap());

        let connect = resolve(Role::Connected, 6969, "localhost").await.unwrap();
        assert_eq!(connect, "127.0.0.1:6969".parse::<SocketAddr>().unwrap());

        let literal = resolve(Role::Connected, 80, "10.1.2.3").await.unwrap();
        assert_eq!(literal, "10.1.2.3:80".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_roles() {
        let (listener, client, server) = connected_pair().await;
        assert_eq!(listener.role(), Role::Listener);
        assert_eq!(client.role(), Role::Connected);
        assert_eq!(server.role(), Role::Connected);
        assert_eq!(server.peer_addr().unwrap(), client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_write_then_read_exact() {
        let (_listener, mut client, mut server) = connected_pair().await;

        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        // Large enough to need several partial writes and reads.
        let reader = tokio::spawn(async move { server.read_exact(expected.len()).await });
        client.write_exact(&payload).await.expect("write_exact failed");

        let received = reader.await.unwrap().expect("read_exact failed");
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_read_exact_zero_bytes() {
        let (_listener, _client, mut server) = connected_pair().await;
        let received = server.read_exact(0).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_read_reports_disconnect_on_close() {
        let (_listener, client, mut server) = connected_pair().await;
        drop(client);

        let result = timeout(Duration::from_secs(2), server.read_exact(5))
            .await
            .expect("Timeout waiting for disconnect");
        assert!(matches!(result, Err(NetError::Disconnected)));
    }

    #[tokio::test]
    async fn test_partial_payload_then_close_is_disconnect() {
        let (_listener, mut client, mut server) = connected_pair().await;
        client.write_exact(&[1, 2, 3]).await.unwrap();
        drop(client);

        let result = timeout(Duration::from_secs(2), server.read_exact(5))
            .await
            .expect("Timeout waiting for disconnect");
        assert!(matches!(result, Err(NetError::Disconnected)));
    }

    #[tokio::test]
    async fn test_accept_on_connected_handle_fails() {
        let (_listener, client, _server) = connected_pair().await;
        let result = client.accept().await;
        assert!(matches!(result, Err(NetError::NotListener)));
    }

    #[tokio::test]
    async fn test_stream_ops_on_listener_fail() {
        let mut listener = TransportHandle::create(Role::Listener, 0, "127.0.0.1").await.unwrap();
        assert!(matches!(listener.write_exact(b"x").await, Err(NetError::NotConnected)));
        assert!(matches!(listener.read_exact(1).await, Err(NetError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Grab a free port, then release it so nothing listens there.
        let port = {
            let listener = TransportHandle::create(Role::Listener, 0, "127.0.0.1").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = TransportHandle::create(Role::Connected, port, "127.0.0.1").await;
        assert!(matches!(result, Err(NetError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = TransportHandle::create(Role::Listener, 0, "127.0.0.1").await.unwrap();
        let port = first.local_addr().unwrap().port();

        let second = TransportHandle::create(Role::Listener, port, "127.0.0.1").await;
        assert!(matches!(second, Err(NetError::Bind { .. })));
    }
}
