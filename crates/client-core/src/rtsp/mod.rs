//! Control protocol messages
//!
//! The session speaks a small subset of RTSP/1.0:
//!
//! ```text
//! SETUP movie.mjpeg RTSP/1.0\r\n
//! CSeq: 1\r\n
//! Transport: RTP/UDP; client_port=25000\r\n
//! \r\n
//! ```
//!
//! | Method | Sent from | Carries |
//! |--------|-----------|---------|
//! | SETUP | INIT | Transport with the local media port |
//! | PLAY | READY | Session |
//! | PAUSE | PLAYING | Session |
//! | TEARDOWN | READY, PLAYING | Session |
//!
//! Responses start with `RTSP/1.0 <code> <reason>`; only 200 counts as
//! success.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod request;
pub mod response;

pub use request::RtspRequest;
pub use response::RtspResponse;

/// Protocol version written on requests and required on responses
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtspMethod {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl RtspMethod {
    /// Name of the method on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for RtspMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
