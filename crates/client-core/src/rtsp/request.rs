//! Control request encoding

use std::fmt;

use bytes::Bytes;

use super::{RtspMethod, RTSP_VERSION};

/// One control request, built per command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspRequest {
    pub method: RtspMethod,
    pub resource: String,
    pub cseq: u32,

    /// Local media port, announced on SETUP only
    pub client_port: Option<u16>,

    /// Session identifier, sent on every command except SETUP
    pub session_id: Option<String>,
}

impl RtspRequest {
    /// SETUP request announcing the port media should be sent to
    pub fn setup(resource: impl Into<String>, cseq: u32, client_port: u16) -> Self {
        Self {
            method: RtspMethod::Setup,
            resource: resource.into(),
            cseq,
            client_port: Some(client_port),
            session_id: None,
        }
    }

    /// Request within an established session
    pub fn in_session(
        method: RtspMethod,
        resource: impl Into<String>,
        cseq: u32,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            method,
            resource: resource.into(),
            cseq,
            client_port: None,
            session_id: Some(session_id.into()),
        }
    }

    /// Wire bytes of the request, blank line included
    pub fn encode(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl fmt::Display for RtspRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\r\n", self.method, self.resource, RTSP_VERSION)?;
        write!(f, "CSeq: {}\r\n", self.cseq)?;
        if let Some(port) = self.client_port {
            write!(f, "Transport: RTP/UDP; client_port={}\r\n", port)?;
        }
        if let Some(session_id) = &self.session_id {
            write!(f, "Session: {}\r\n", session_id)?;
        }
        f.write_str("\r\n")
    }
}
