//! TCP transport to the proxy.
//!
//! [`TcpTransport`] is the non-blocking handle built on tokio;
//! [`connect_blocking`] produces a `std` socket for the blocking driver.

use std::future::Future;
use std::io;
use std::net::{TcpStream as StdTcpStream, ToSocketAddrs};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::config::TcpTransportConfig;
use super::{AsyncTransport, IoFuture};

/// Connectable tokio TCP handle.
#[derive(Debug)]
pub struct TcpTransport {
    config: TcpTransportConfig,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Create an unconnected transport.
    pub fn new(config: TcpTransportConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// Transport configuration.
    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }

    /// Check if the socket is connected.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Release the stream, e.g. to run TLS over an established tunnel.
    pub fn into_stream(self) -> Option<TcpStream> {
        self.stream
    }

    fn connected_stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport not connected"))
    }
}

impl AsyncTransport for TcpTransport {
    fn connect(&mut self) -> IoFuture<'_, ()> {
        Box::pin(async move {
            if self.stream.is_some() {
                return Ok(());
            }

            let addr = self.config.proxy_addr.clone();
            tracing::debug!("connecting to proxy {}", addr);

            let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect to {addr} timed out"),
                    )
                })??;
            stream.set_nodelay(self.config.nodelay)?;

            self.stream = Some(stream);
            Ok(())
        })
    }

    fn send<'a>(&'a mut self, buf: &'a [u8]) -> IoFuture<'a, usize> {
        Box::pin(async move {
            let deadline = self.config.io_timeout;
            let stream = self.connected_stream()?;
            with_deadline(deadline, stream.write(buf)).await
        })
    }

    fn receive<'a>(&'a mut self, buf: &'a mut [u8]) -> IoFuture<'a, usize> {
        Box::pin(async move {
            let deadline = self.config.io_timeout;
            let stream = self.connected_stream()?;
            with_deadline(deadline, stream.read(buf)).await
        })
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.connected_stream()?.try_read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    operation: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "transport deadline elapsed"))?,
        None => operation.await,
    }
}

/// Open a blocking socket to the proxy, applying the configured deadlines.
///
/// Every resolved address is tried in turn; the last error is returned if
/// none accepts the connection.
pub fn connect_blocking(config: &TcpTransportConfig) -> io::Result<StdTcpStream> {
    let mut last_err = None;

    for addr in config.proxy_addr.to_socket_addrs()? {
        tracing::debug!("connecting to proxy {}", addr);
        match StdTcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => {
                stream.set_nodelay(config.nodelay)?;
                stream.set_read_timeout(config.io_timeout)?;
                stream.set_write_timeout(config.io_timeout)?;
                return Ok(stream);
            },
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} resolved to no addresses", config.proxy_addr),
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_transport_starts_unconnected() {
        let transport = TcpTransport::new(TcpTransportConfig::new("127.0.0.1:3128"));
        assert!(!transport.is_connected());
        assert_eq!(transport.name(), "TCP");
        assert_eq!(transport.config().proxy_addr, "127.0.0.1:3128");
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut transport = TcpTransport::new(TcpTransportConfig::default());
        let err = transport.send(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let mut buf = [0u8; 1];
        let err = transport.try_receive(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(b"pong").await.unwrap();
            buf
        });

        let mut transport = TcpTransport::new(TcpTransportConfig::new(addr.to_string()));
        transport.connect().await.unwrap();
        assert!(transport.is_connected());
        // Second connect is a no-op.
        transport.connect().await.unwrap();

        assert_eq!(transport.send(b"ping").await.unwrap(), 4);
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            let n = transport.receive(&mut buf[filled..]).await.unwrap();
            assert!(n > 0);
            filled += n;
        }
        assert_eq!(&buf, b"pong");
        assert_eq!(&peer.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let mut transport = TcpTransport::new(
            TcpTransportConfig::new(addr.to_string()).with_connect_timeout(Duration::from_secs(2)),
        );
        assert!(transport.connect().await.is_err());
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_connect_blocking_applies_timeouts() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let config = TcpTransportConfig::new(addr.to_string())
            .with_io_timeout(Some(Duration::from_secs(5)));

        let stream = connect_blocking(&config).unwrap();
        assert_eq!(stream.read_timeout().unwrap(), Some(Duration::from_secs(5)));
        assert!(stream.nodelay().unwrap());
    }
}
