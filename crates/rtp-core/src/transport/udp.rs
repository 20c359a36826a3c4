//! UDP transport for media datagrams

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use super::MediaTransport;
use crate::error::Error;
use crate::Result;

/// UDP transport for media datagrams
pub struct UdpMediaTransport {
    /// Bound socket, `None` once closed
    socket: Mutex<Option<Arc<UdpSocket>>>,

    /// Address the socket was bound to
    local_addr: SocketAddr,
}

impl UdpMediaTransport {
    /// Bind a new UDP socket
    ///
    /// Binding to port 0 lets the system pick a free port; read it back
    /// through [`MediaTransport::local_addr`].
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::Transport(format!("Failed to bind media socket on {}: {}", addr, e)))?;
        let local_addr = socket.local_addr()?;

        debug!("Media socket bound to {}", local_addr);

        Ok(Self {
            socket: Mutex::new(Some(Arc::new(socket))),
            local_addr,
        })
    }

    /// Whether [`close`](MediaTransport::close) has been called
    pub fn is_closed(&self) -> bool {
        self.socket.lock().is_none()
    }

    fn socket(&self) -> Result<Arc<UdpSocket>> {
        self.socket
            .lock()
            .clone()
            .ok_or_else(|| Error::Transport("media socket is closed".to_string()))
    }
}

#[async_trait]
impl MediaTransport for UdpMediaTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        if self.is_closed() {
            return Err(Error::Transport("media socket is closed".to_string()));
        }
        Ok(self.local_addr)
    }

    async fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.socket()?;
        let (len, source) = socket
            .recv_from(buf)
            .await
            .map_err(|e| Error::Transport(format!("Media socket receive failed: {}", e)))?;

        trace!("Received {} byte datagram from {}", len, source);
        Ok(len)
    }

    async fn close(&self) -> Result<()> {
        if self.socket.lock().take().is_some() {
            debug!("Media socket on {} closed", self.local_addr);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_receive_datagram() {
        let transport = UdpMediaTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let target = transport.local_addr().unwrap();
        assert_ne!(target.port(), 0);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"datagram", target).await.unwrap();

        let mut buf = [0u8; 64];
        let len = tokio::time::timeout(Duration::from_secs(2), transport.recv_datagram(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"datagram");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = UdpMediaTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(transport.is_closed());
        assert!(transport.local_addr().is_err());

        let mut buf = [0u8; 16];
        assert!(matches!(
            transport.recv_datagram(&mut buf).await,
            Err(Error::Transport(_))
        ));
    }
}
