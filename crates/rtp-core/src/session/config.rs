//! Receiver configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::{Result, DEFAULT_MAX_PACKET_SIZE};

/// Default receive wait before the loop re-checks its stop signal
pub const DEFAULT_RECV_POLL_INTERVAL_MS: u64 = 5;

/// Default hold applied to the first packet of a session
pub const DEFAULT_WARMUP_DELAY_MS: u64 = 50;

/// Default upper bound on the delay given to an out-of-order packet
pub const DEFAULT_MAX_REORDER_DELAY_MS: u64 = 250;

/// Largest warm-up or reorder delay accepted by [`ReceiverConfig::validate`]
pub const MAX_HOLD_DELAY_MS: u64 = 10_000;

/// Default number of sequence numbers remembered for duplicate detection
pub const DEFAULT_MAX_RETAINED_PACKETS: usize = 1024;

/// Default number of packets that may wait for release at once
pub const DEFAULT_MAX_PARKED_PACKETS: usize = 64;

/// Default limit on a reassembled frame
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Media receiver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Longest single wait for a datagram before the loop looks at its
    /// stop signal and release timers again
    pub recv_poll_interval_ms: u64,

    /// Hold applied to the first packet of a session
    pub warmup_delay_ms: u64,

    /// Cap on the delay given to an out-of-order packet
    pub max_reorder_delay_ms: u64,

    /// Seconds of delay per second since the last delivery and per
    /// timestamp tick of gap
    ///
    /// The default treats 3000 ticks (one frame at 30 fps on a 90 kHz clock)
    /// as one unit of gap.
    pub timestamp_gap_weight: f64,

    /// Sequence numbers remembered for duplicate detection
    pub max_retained_packets: usize,

    /// Packets that may wait for release at once
    pub max_parked_packets: usize,

    /// Receive buffer size for a single datagram
    pub max_datagram_size: usize,

    /// Largest logical packet accepted before the partial frame is dropped
    pub max_frame_size: usize,

    /// Timestamp ticks per second, used for rate statistics
    pub clock_rate: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            recv_poll_interval_ms: DEFAULT_RECV_POLL_INTERVAL_MS,
            warmup_delay_ms: DEFAULT_WARMUP_DELAY_MS,
            max_reorder_delay_ms: DEFAULT_MAX_REORDER_DELAY_MS,
            timestamp_gap_weight: 1.0 / 3000.0,
            max_retained_packets: DEFAULT_MAX_RETAINED_PACKETS,
            max_parked_packets: DEFAULT_MAX_PARKED_PACKETS,
            max_datagram_size: DEFAULT_MAX_PACKET_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            clock_rate: 90_000,
        }
    }
}

impl ReceiverConfig {
    pub fn with_warmup_delay_ms(mut self, warmup_delay_ms: u64) -> Self {
        self.warmup_delay_ms = warmup_delay_ms;
        self
    }

    pub fn with_max_reorder_delay_ms(mut self, max_reorder_delay_ms: u64) -> Self {
        self.max_reorder_delay_ms = max_reorder_delay_ms;
        self
    }

    pub fn with_timestamp_gap_weight(mut self, weight: f64) -> Self {
        self.timestamp_gap_weight = weight;
        self
    }

    pub fn with_clock_rate(mut self, clock_rate: u32) -> Self {
        self.clock_rate = clock_rate;
        self
    }

    pub fn recv_poll_interval(&self) -> Duration {
        Duration::from_millis(self.recv_poll_interval_ms)
    }

    pub fn warmup_delay(&self) -> Duration {
        Duration::from_millis(self.warmup_delay_ms)
    }

    pub fn max_reorder_delay(&self) -> Duration {
        Duration::from_millis(self.max_reorder_delay_ms)
    }

    /// Check the settings for values the receiver cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.recv_poll_interval_ms == 0 {
            return Err(Error::InvalidParameter(
                "recv_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.warmup_delay_ms > MAX_HOLD_DELAY_MS {
            return Err(Error::InvalidParameter(format!(
                "warmup_delay_ms ({}) must not exceed {}",
                self.warmup_delay_ms, MAX_HOLD_DELAY_MS
            )));
        }
        if self.max_reorder_delay_ms > MAX_HOLD_DELAY_MS {
            return Err(Error::InvalidParameter(format!(
                "max_reorder_delay_ms ({}) must not exceed {}",
                self.max_reorder_delay_ms, MAX_HOLD_DELAY_MS
            )));
        }
        if !self.timestamp_gap_weight.is_finite() || self.timestamp_gap_weight < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "timestamp_gap_weight must be a non-negative number, got {}",
                self.timestamp_gap_weight
            )));
        }
        if self.max_parked_packets == 0 || self.max_parked_packets >= self.max_retained_packets {
            return Err(Error::InvalidParameter(format!(
                "max_parked_packets ({}) must be non-zero and below max_retained_packets ({})",
                self.max_parked_packets, self.max_retained_packets
            )));
        }
        if self.max_retained_packets > 0x8000 {
            return Err(Error::InvalidParameter(format!(
                "max_retained_packets ({}) must cover at most half the sequence space",
                self.max_retained_packets
            )));
        }
        if self.max_datagram_size == 0 || self.max_frame_size < self.max_datagram_size {
            return Err(Error::InvalidParameter(format!(
                "max_frame_size ({}) must be at least max_datagram_size ({}), which must be non-zero",
                self.max_frame_size, self.max_datagram_size
            )));
        }
        Ok(())
    }
}
