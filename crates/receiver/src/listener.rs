//! The inbound socket capability.
//!
//! Exactly one connection is serviced per process lifetime, and the type
//! system enforces it: [`UpdateListener::accept`] consumes the listener, so
//! the listening socket is gone by the time the transfer starts.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{error, info};

/// A bind, listen or accept failure.
///
/// All three are fatal to the update attempt: they are reported, never
/// silently retried, and occur before any storage interaction.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("bind failed: {source}")]
    Bind { source: io::Error },

    #[error("listen failed: {source}")]
    Listen { source: io::Error },

    #[error("accept failed: {source}")]
    Accept { source: io::Error },
}

impl ConnectionError {
    fn bind(source: io::Error) -> Self {
        Self::Bind { source }
    }

    fn listen(source: io::Error) -> Self {
        Self::Listen { source }
    }

    fn accept(source: io::Error) -> Self {
        Self::Accept { source }
    }
}

/// Owns the listening socket until the single inbound connection arrives.
#[derive(Debug)]
pub struct UpdateListener {
    listener: TcpListener,
}

impl UpdateListener {
    /// Binds an IPv4 listening socket on `port` with the given backlog.
    pub fn bind(port: u16, backlog: u32) -> Result<Self, ConnectionError> {
        info!(port, backlog, "server socket listening");

        let socket = TcpSocket::new_v4().map_err(ConnectionError::bind)?;
        socket
            .bind(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)))
            .map_err(|e| {
                error!(port, os_error = ?e.raw_os_error(), cause = %e, "bind server error");
                ConnectionError::bind(e)
            })?;

        let listener = socket.listen(backlog).map_err(|e| {
            error!(port, os_error = ?e.raw_os_error(), cause = %e, "listen server error");
            ConnectionError::listen(e)
        })?;

        Ok(Self { listener })
    }

    /// The bound address, useful when `port` was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts exactly one connection, consuming the listener.
    pub async fn accept(self) -> Result<TcpStream, ConnectionError> {
        let (stream, remote_addr) = self.listener.accept().await.map_err(|e| {
            error!(os_error = ?e.raw_os_error(), cause = %e, "accept server error");
            ConnectionError::accept(e)
        })?;

        info!(%remote_addr, "tcp connection established");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_accepts_one_connection() {
        let listener = UpdateListener::bind(0, 5).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"hello").await.unwrap();
        });

        let stream = listener.accept().await.unwrap();
        assert!(stream.peer_addr().is_ok());
        client.await.unwrap();
        // `listener` is consumed here; a second accept does not compile
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = UpdateListener::bind(0, 5).unwrap();
        let port = first.local_addr().unwrap().port();

        let err = UpdateListener::bind(port, 5).unwrap_err();
        assert!(matches!(err, ConnectionError::Bind { .. } | ConnectionError::Listen { .. }));
    }
}
