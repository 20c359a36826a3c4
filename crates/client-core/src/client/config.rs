//! Client configuration
//!
//! ```rust
//! use rstream_client_core::ClientConfig;
//!
//! let config = ClientConfig::new("127.0.0.1:8554".parse().unwrap())
//!     .with_response_timeout_ms(2000);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.media_bind_addr.port(), 0);
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use rstream_rtp_core::ReceiverConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Default bound on waiting for a control response
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;

/// Default limit on a single control response
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// Streaming client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server control address
    pub server_addr: SocketAddr,

    /// Local address for media; port 0 picks a free port
    pub media_bind_addr: SocketAddr,

    /// How long to wait for each control response
    pub response_timeout_ms: u64,

    /// Largest control response accepted
    pub max_response_size: usize,

    /// Media receiver settings
    pub receiver: ReceiverConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 554)),
            media_bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            receiver: ReceiverConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            ..Default::default()
        }
    }

    pub fn with_media_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.media_bind_addr = addr;
        self
    }

    pub fn with_response_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = timeout_ms;
        self
    }

    pub fn with_receiver(mut self, receiver: ReceiverConfig) -> Self {
        self.receiver = receiver;
        self
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Check the settings before any socket is opened
    pub fn validate(&self) -> ClientResult<()> {
        if self.response_timeout_ms == 0 {
            return Err(ClientError::invalid_configuration(
                "response_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.max_response_size < 16 {
            return Err(ClientError::invalid_configuration(
                "max_response_size",
                format!("{} bytes cannot hold a status line", self.max_response_size),
            ));
        }
        self.receiver
            .validate()
            .map_err(|e| ClientError::invalid_configuration("receiver", e.to_string()))
    }
}
