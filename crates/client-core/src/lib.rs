//! Streaming client core for the rstream project
//!
//! This crate drives a control session against a streaming server and wires
//! it to the media receiver from `rstream-rtp-core`:
//!
//! - `client`: the [`RtspSession`] state machine and its configuration
//! - `rtsp`: control request encoding and response parsing
//! - `transport`: the control channel trait and its TCP implementation
//! - `logging`: subscriber setup for binaries
//!
//! Frames reach the application through a [`FrameSink`]; any
//! `Fn(u8, bool, u16, u32, Bytes)` closure works as one.

pub mod client;
pub mod error;
pub mod logging;
pub mod rtsp;
pub mod transport;

pub use client::{ClientConfig, RtspSession, SessionState};
pub use error::{ClientError, ClientResult};
pub use logging::{parse_log_level, setup_logging, LoggingConfig};
pub use rtsp::{RtspMethod, RtspRequest, RtspResponse};
pub use transport::{ControlTransport, TcpControlTransport};

pub use rstream_rtp_core::{
    FrameSink, MediaTransport, ReceiverConfig, ReceiverStatus, ReceptionStats, UdpMediaTransport,
};
