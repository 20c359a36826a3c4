//! Media receiver
//!
//! The [`RtpReceiver`] owns the background receive loop: it reads framed
//! datagrams from a [`MediaTransport`](crate::MediaTransport), runs them
//! through the reorder window and hands released frames to a [`FrameSink`].

mod config;
mod receiver;

pub use config::{
    ReceiverConfig, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_PARKED_PACKETS,
    DEFAULT_MAX_REORDER_DELAY_MS, DEFAULT_MAX_RETAINED_PACKETS, DEFAULT_RECV_POLL_INTERVAL_MS,
    DEFAULT_WARMUP_DELAY_MS, MAX_HOLD_DELAY_MS,
};
pub use receiver::{ReceiverStatus, RtpReceiver};

use bytes::Bytes;

use crate::{RtpSequenceNumber, RtpTimestamp};

/// Consumer of delivered frames
///
/// Called from the receive loop, one frame at a time, in delivery order.
/// Implementations should return quickly; the loop does not read the
/// network while a frame is being handed over.
pub trait FrameSink: Send + Sync + 'static {
    fn on_frame(
        &self,
        payload_type: u8,
        marker: bool,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        payload: Bytes,
    );
}

impl<F> FrameSink for F
where
    F: Fn(u8, bool, RtpSequenceNumber, RtpTimestamp, Bytes) + Send + Sync + 'static,
{
    fn on_frame(
        &self,
        payload_type: u8,
        marker: bool,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        payload: Bytes,
    ) {
        self(payload_type, marker, sequence_number, timestamp, payload)
    }
}
