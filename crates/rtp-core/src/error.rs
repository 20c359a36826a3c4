use std::io;
use thiserror::Error;

/// Error type for RTP operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Error when decoding a media packet
    #[error("Failed to decode RTP packet: {0}")]
    DecodeError(String),

    /// Buffer too small
    #[error("Buffer too small for RTP packet: need {required} but have {available}")]
    BufferTooSmall {
        required: usize,
        available: usize,
    },

    /// A frame grew past the configured limit without an end marker
    #[error("Frame exceeded {limit} bytes without an end-of-frame marker")]
    FrameTooLarge {
        limit: usize,
    },

    /// Invalid parameter for RTP operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error when receiving datagrams
    #[error("IO error: {0}")]
    IoError(String),

    /// Receiver lifecycle error
    #[error("RTP session error: {0}")]
    SessionError(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Whether the receive loop can carry on after this error
    ///
    /// Malformed datagrams and oversized frames only cost the packet at hand;
    /// everything else ends the loop.
    pub fn is_packet_local(&self) -> bool {
        matches!(
            self,
            Error::DecodeError(_) | Error::BufferTooSmall { .. } | Error::FrameTooLarge { .. }
        )
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}
