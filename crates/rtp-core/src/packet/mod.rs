//! Media packet definitions and decoding
//!
//! Every media packet starts with a fixed 12-byte header:
//!
//! ```text
//!  byte 0      byte 1       bytes 2-3        bytes 4-7       bytes 8-11
//! +--------+-+-------+----------------+----------------+----------------+
//! | (n/a)  |M|  PT   | sequence (BE)  | timestamp (BE) |   reserved     |
//! +--------+-+-------+----------------+----------------+----------------+
//! ```
//!
//! Header extensions and CSRC lists are not interpreted; everything from
//! byte 12 onward is payload.

mod frame;

pub use frame::{FrameAssembler, END_OF_FRAME_MARKER};

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSequenceNumber, RtpTimestamp};

/// Size of the fixed media packet header in bytes
pub const RTP_HEADER_SIZE: usize = 12;

/// Marker flag in the second header byte
const RTP_MARKER_MASK: u8 = 0x80;

/// Payload type bits in the second header byte
const RTP_PT_MASK: u8 = 0x7F;

/// Decoded media packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// First header byte, carried through untouched
    pub flags: u8,

    /// Marker bit (frame boundary hint from the sender)
    pub marker: bool,

    /// Payload type (7 bits)
    pub payload_type: u8,

    /// Sequence number, wraps at 2^16
    pub sequence_number: RtpSequenceNumber,

    /// Sender clock timestamp, units opaque to the receiver
    pub timestamp: RtpTimestamp,

    /// Bytes 8-11, not interpreted
    pub reserved: u32,
}

impl RtpHeader {
    /// Create a new header with the given fields and zeroed reserved bytes
    pub fn new(
        payload_type: u8,
        marker: bool,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
    ) -> Self {
        Self {
            flags: 0x80,
            marker,
            payload_type: payload_type & RTP_PT_MASK,
            sequence_number,
            timestamp,
            reserved: 0,
        }
    }

    /// Parse a header from the front of the buffer
    pub fn parse(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < RTP_HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                required: RTP_HEADER_SIZE,
                available: buf.remaining(),
            });
        }

        let flags = buf.get_u8();

        // Second byte: marker (1 bit), payload type (7 bits)
        let second_byte = buf.get_u8();
        let marker = second_byte & RTP_MARKER_MASK != 0;
        let payload_type = second_byte & RTP_PT_MASK;

        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let reserved = buf.get_u32();

        Ok(Self {
            flags,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            reserved,
        })
    }

    /// Serialize the header into the buffer
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.reserve(RTP_HEADER_SIZE);
        buf.put_u8(self.flags);
        let marker = if self.marker { RTP_MARKER_MASK } else { 0 };
        buf.put_u8(marker | (self.payload_type & RTP_PT_MASK));
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.reserved);
    }
}

/// A decoded media packet
#[derive(Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Packet header
    pub header: RtpHeader,

    /// Everything after the fixed header
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a new packet from a header and payload
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Decode a full logical packet
    ///
    /// Fails with [`Error::DecodeError`] when the input cannot hold the fixed
    /// header. The payload shares the input allocation.
    pub fn decode(mut data: Bytes) -> Result<Self> {
        let header = RtpHeader::parse(&mut data).map_err(|e| match e {
            Error::BufferTooSmall { required, available } => Error::DecodeError(format!(
                "packet of {} bytes is shorter than the {} byte header",
                available, required
            )),
            other => other,
        })?;

        Ok(Self { header, payload: data })
    }

    /// Decode a packet from a borrowed slice
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::decode(Bytes::copy_from_slice(data))
    }

    /// Serialize the packet to bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.serialize(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Total wire size of the packet
    pub fn size(&self) -> usize {
        RTP_HEADER_SIZE + self.payload.len()
    }

    pub fn sequence_number(&self) -> RtpSequenceNumber {
        self.header.sequence_number
    }

    pub fn timestamp(&self) -> RtpTimestamp {
        self.header.timestamp
    }
}

impl fmt::Debug for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpPacket")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}
