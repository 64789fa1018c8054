//! Opens the transport to the proxy and runs the handshake over it.

use std::net::{TcpStream as StdTcpStream, ToSocketAddrs};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{ClientConfig, ProxyAddress, ProxyLocator};
use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::handshake::HandshakeEngine;
use crate::protocol::TargetAddress;
use crate::tunnel::Tunnel;

/// Tunneling client: one proxy, one set of credentials, many targets.
///
/// Every call to [`Connector::connect`] opens a fresh connection and runs a
/// fresh handshake. Failed attempts are not retried.
pub struct Connector {
    credentials: Credentials,
    locator: Box<dyn ProxyLocator + Send + Sync>,
    connect_timeout: Duration,
}

impl Connector {
    /// Create a connector from a validated configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate().map_err(Error::config)?;
        Ok(Self {
            credentials: config.credentials()?,
            locator: config.locator(),
            connect_timeout: config.connect_timeout(),
        })
    }

    /// Create a connector with an explicit locator.
    pub fn with_locator(
        credentials: Credentials,
        locator: impl ProxyLocator + Send + Sync + 'static,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            locator: Box::new(locator),
            connect_timeout,
        }
    }

    /// Look up the proxy address.
    pub fn proxy(&self) -> Result<ProxyAddress> {
        self.locator.locate()
    }

    /// Connect to `target` through the proxy.
    pub async fn connect(&self, target: TargetAddress) -> Result<Tunnel<TcpStream>> {
        let engine = HandshakeEngine::new(self.credentials.clone(), target)?;
        let proxy = self.proxy()?;

        tracing::debug!("connecting to proxy {}", proxy);
        let stream = timeout(
            self.connect_timeout,
            TcpStream::connect((proxy.host.as_str(), proxy.port)),
        )
        .await
        .map_err(|_| Error::Timeout(self.connect_timeout.as_millis() as u64))??;

        stream.set_nodelay(true)?;

        let tunnel = engine.establish_async(stream).await?;
        tracing::info!("tunnel to {} via {} established", tunnel.target(), proxy);
        Ok(tunnel)
    }

    /// Blocking variant of [`Connector::connect`].
    ///
    /// Tries each resolved proxy address in turn until one accepts the TCP
    /// connection.
    pub fn connect_blocking(&self, target: TargetAddress) -> Result<Tunnel<StdTcpStream>> {
        let engine = HandshakeEngine::new(self.credentials.clone(), target)?;
        let proxy = self.proxy()?;

        let mut last_error = None;
        let mut connected = None;
        for candidate in (proxy.host.as_str(), proxy.port).to_socket_addrs()? {
            match StdTcpStream::connect_timeout(&candidate, self.connect_timeout) {
                Ok(stream) => {
                    connected = Some(stream);
                    break;
                }
                Err(e) => {
                    tracing::debug!("proxy candidate {} failed: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        let stream = match (connected, last_error) {
            (Some(stream), _) => stream,
            (None, Some(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(Error::Timeout(self.connect_timeout.as_millis() as u64))
            }
            (None, Some(e)) => return Err(e.into()),
            (None, None) => {
                return Err(Error::config(format!(
                    "proxy {} resolved to no addresses",
                    proxy
                )))
            }
        };

        stream.set_nodelay(true)?;

        let tunnel = engine.establish(stream)?;
        tracing::info!("tunnel to {} via {} established", tunnel.target(), proxy);
        Ok(tunnel)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::StaticLocator;
    use crate::credentials::RoutingId;

    async fn accept_and_grant(listener: TcpListener) {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut greeting = [0u8; 3];
        socket.read_exact(&mut greeting).await.unwrap();
        socket.write_all(&[0x05, 0x80]).await.unwrap();

        let mut head = [0u8; 5];
        socket.read_exact(&mut head).await.unwrap();
        let token_len = u32::from_be_bytes([head[1], head[2], head[3], head[4]]) as usize;
        let mut rest = vec![0u8; token_len];
        socket.read_exact(&mut rest).await.unwrap();
        let id_len = socket.read_u8().await.unwrap() as usize;
        let mut id = vec![0u8; id_len];
        socket.read_exact(&mut id).await.unwrap();
        socket.write_all(&[0x01, 0x00]).await.unwrap();

        let mut connect = [0u8; 10];
        socket.read_exact(&mut connect).await.unwrap();
        socket
            .write_all(&[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x1F, 0x90])
            .await
            .unwrap();

        let mut buf = [0u8; 4];
        socket.read_exact(&mut buf).await.unwrap();
        socket.write_all(&buf).await.unwrap();
    }

    fn connector(port: u16) -> Connector {
        let credentials = Credentials::new("jwt", RoutingId::from_location(None)).unwrap();
        Connector::with_locator(
            credentials,
            StaticLocator::new(ProxyAddress::new("127.0.0.1", port)),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_connect_through_local_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let proxy = tokio::spawn(accept_and_grant(listener));

        let mut tunnel = connector(port)
            .connect(TargetAddress::new("10.0.0.1", 8080))
            .await
            .unwrap();

        tunnel.write_all(b"echo").await.unwrap();
        let mut buf = [0u8; 4];
        tunnel.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"echo");

        proxy.await.unwrap();
    }

    #[test]
    fn test_connector_rejects_invalid_config() {
        assert!(Connector::new(&ClientConfig::new("")).is_err());
    }

    #[test]
    fn test_long_host_fails_before_connecting() {
        // Port 9 on localhost is never contacted: the host check runs first.
        let err = connector(9)
            .connect_blocking(TargetAddress::new("h".repeat(300), 80))
            .unwrap_err();
        assert!(err.is_precondition());
    }
}
