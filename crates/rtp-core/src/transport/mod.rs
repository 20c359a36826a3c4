//! Network transport for media datagrams
//!
//! This module provides the abstraction the receive loop reads datagrams from.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::Result;

/// Trait for media datagram transports
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Get the local address datagrams are received on
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Receive one datagram into `buf`, returning its length
    ///
    /// Waits until a datagram arrives; callers bound the wait themselves.
    async fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize>;

    /// Close the transport
    ///
    /// Safe to call more than once. Receives after closing fail with
    /// [`Error::Transport`](crate::Error::Transport).
    async fn close(&self) -> Result<()>;
}

pub mod udp;

pub use udp::UdpMediaTransport;
