//! Control channel transport
//!
//! The session only needs to push request bytes out and pull one complete
//! response back, so the seam is a small async trait. [`TcpControlTransport`]
//! is the implementation used against a real server; tests drive the session
//! through scripted implementations.

use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{ClientError, ClientResult};

/// Blank line ending a response header block
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Reliable byte-stream channel for control messages
#[async_trait]
pub trait ControlTransport: Send + Sync {
    /// Send one encoded request
    async fn send(&self, request: &[u8]) -> ClientResult<()>;

    /// Receive one complete response message
    ///
    /// Waits until a full message is available; callers bound the wait.
    async fn recv(&self) -> ClientResult<Bytes>;

    /// Close the channel; safe to call more than once
    async fn close(&self) -> ClientResult<()>;
}

struct ReadState {
    stream: OwnedReadHalf,

    /// Bytes read past the end of the previous response
    pending: BytesMut,
}

/// TCP control channel
pub struct TcpControlTransport {
    reader: Mutex<Option<ReadState>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    peer_addr: SocketAddr,
    max_response_size: usize,
}

impl TcpControlTransport {
    /// Connect to the server's control port
    pub async fn connect(addr: SocketAddr, max_response_size: usize) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            ClientError::transport_failure(format!("Failed to connect to {}: {}", addr, e))
        })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on control connection: {}", e);
        }

        debug!("Control connection established to {}", addr);

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(Some(ReadState {
                stream: read_half,
                pending: BytesMut::with_capacity(1024),
            })),
            writer: Mutex::new(Some(write_half)),
            peer_addr: addr,
            max_response_size,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

#[async_trait]
impl ControlTransport for TcpControlTransport {
    async fn send(&self, request: &[u8]) -> ClientResult<()> {
        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or(ClientError::ConnectionClosed)?;

        stream
            .write_all(request)
            .await
            .map_err(|e| ClientError::transport_failure(format!("Send failed: {}", e)))?;

        trace!("Sent {} byte request to {}", request.len(), self.peer_addr);
        Ok(())
    }

    async fn recv(&self) -> ClientResult<Bytes> {
        let mut reader = self.reader.lock().await;
        let state = reader.as_mut().ok_or(ClientError::ConnectionClosed)?;

        loop {
            if let Some(pos) = find_terminator(&state.pending) {
                let message = state.pending.split_to(pos + HEADER_TERMINATOR.len()).freeze();
                trace!("Received {} byte response from {}", message.len(), self.peer_addr);
                return Ok(message);
            }

            if state.pending.len() >= self.max_response_size {
                return Err(ClientError::malformed_response(format!(
                    "response exceeds {} bytes without a header terminator",
                    self.max_response_size
                )));
            }

            let read = state
                .stream
                .read_buf(&mut state.pending)
                .await
                .map_err(|e| ClientError::transport_failure(format!("Receive failed: {}", e)))?;

            if read == 0 {
                return Err(ClientError::transport_failure(
                    "Connection closed by server",
                ));
            }
        }
    }

    async fn close(&self) -> ClientResult<()> {
        if let Some(mut stream) = self.writer.lock().await.take() {
            // The peer may already be gone
            let _ = stream.shutdown().await;
            debug!("Control connection to {} closed", self.peer_addr);
        }
        self.reader.lock().await.take();
        Ok(())
    }
}
