//! End-marker frame assembly
//!
//! A logical media packet may span several datagrams. Datagrams are
//! concatenated until the accumulated buffer ends with [`END_OF_FRAME_MARKER`].
//! There is no length field, so a payload that happens to contain the marker
//! at a datagram boundary is cut short there. Peers rely on this framing, so
//! it is kept as is.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::Error;
use crate::Result;

/// Two-byte trailer closing every logical packet
pub const END_OF_FRAME_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Accumulates datagrams into complete logical packets
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameAssembler {
    /// Create an assembler that gives up on frames larger than `max_frame_size`
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Append one datagram
    ///
    /// Returns the complete logical packet once the buffer ends with the end
    /// marker. The marker stays part of the returned bytes. A frame that
    /// outgrows the limit is dropped and reported as [`Error::FrameTooLarge`].
    pub fn push(&mut self, datagram: &[u8]) -> Result<Option<Bytes>> {
        if self.buffer.len() + datagram.len() > self.max_frame_size {
            let dropped = self.buffer.len() + datagram.len();
            self.buffer.clear();
            trace!("Dropping {} byte partial frame", dropped);
            return Err(Error::FrameTooLarge {
                limit: self.max_frame_size,
            });
        }

        self.buffer.extend_from_slice(datagram);

        if self.buffer.ends_with(&END_OF_FRAME_MARKER) {
            Ok(Some(self.buffer.split().freeze()))
        } else {
            Ok(None)
        }
    }

    /// Number of bytes waiting for an end marker
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any partial frame
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_datagram_frame() {
        let mut assembler = FrameAssembler::new(1024);

        let frame = assembler.push(b"header+data\xff\xd9").unwrap();

        assert_eq!(frame.as_deref(), Some(&b"header+data\xff\xd9"[..]));
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_frame_spanning_datagrams() {
        let mut assembler = FrameAssembler::new(1024);

        assert_eq!(assembler.push(b"part one ").unwrap(), None);
        assert_eq!(assembler.push(b"part two ").unwrap(), None);
        assert_eq!(assembler.pending_len(), 18);

        let frame = assembler.push(b"end\xff\xd9").unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"part one part two end\xff\xd9");
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_marker_split_across_datagrams() {
        let mut assembler = FrameAssembler::new(1024);

        assert_eq!(assembler.push(b"abc\xff").unwrap(), None);
        let frame = assembler.push(b"\xd9").unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"abc\xff\xd9");
    }

    #[test]
    fn test_marker_at_datagram_boundary_ends_frame_early() {
        // Payload bytes that end a datagram with the marker close the frame;
        // the remainder is taken as the start of the next one.
        let mut assembler = FrameAssembler::new(1024);

        let first = assembler.push(b"image\xff\xd9").unwrap();
        assert_eq!(first.as_deref(), Some(&b"image\xff\xd9"[..]));

        assert_eq!(assembler.push(b"more image").unwrap(), None);
        assert_eq!(assembler.pending_len(), 10);
    }

    #[test]
    fn test_oversized_frame_is_dropped() {
        let mut assembler = FrameAssembler::new(8);

        assert_eq!(assembler.push(b"12345").unwrap(), None);
        assert_eq!(
            assembler.push(b"6789").unwrap_err(),
            Error::FrameTooLarge { limit: 8 }
        );
        assert_eq!(assembler.pending_len(), 0);

        // The assembler recovers on the next frame
        assert!(assembler.push(b"ok\xff\xd9").unwrap().is_some());
    }
}
