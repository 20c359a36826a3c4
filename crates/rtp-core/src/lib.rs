//! RTP Core library for the rstream project
//!
//! This crate turns a raw datagram stream into an ordered sequence of media
//! frames handed to a consumer callback.
//!
//! The library is organized into several modules:
//!
//! - `packet`: media packet header decoding and end-marker frame assembly
//! - `transport`: datagram transport abstraction and its UDP implementation
//! - `buffer`: the reorder window deciding when each packet is released
//! - `session`: the background receiver task driving the reorder window
//! - `stats`: reception counters and the derived rates

mod error;

pub mod buffer;
pub mod packet;
pub mod session;
pub mod stats;
pub mod transport;

pub use error::Error;

pub use buffer::{ReorderBuffer, ReleasedPacket};
pub use packet::{FrameAssembler, RtpHeader, RtpPacket, END_OF_FRAME_MARKER, RTP_HEADER_SIZE};
pub use session::{FrameSink, ReceiverConfig, ReceiverStatus, RtpReceiver};
pub use stats::{ReceptionStats, ReceptionStatsTracker};
pub use transport::{MediaTransport, UdpMediaTransport};

/// The default maximum size of a single datagram read, in bytes
pub const DEFAULT_MAX_PACKET_SIZE: usize = 0x10000;

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        Error, FrameSink, MediaTransport, ReceiverConfig, ReceptionStats, Result, RtpHeader,
        RtpPacket, RtpReceiver, RtpSequenceNumber, RtpTimestamp,
    };
}

/// Check if sequence `a` is newer than sequence `b`, handling wraparound
///
/// A sequence number is considered newer when it lies in the half of the
/// sequence space ahead of the other one.
pub fn is_sequence_newer(a: RtpSequenceNumber, b: RtpSequenceNumber) -> bool {
    a != b && a.wrapping_sub(b) < 0x8000
}
