//! Scripted collaborators for session tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use rstream_client_core::{
    ClientConfig, ClientError, ClientResult, ControlTransport, FrameSink, MediaTransport,
    RtspSession,
};

pub const SESSION_ID: &str = "123456";
pub const MEDIA_PORT: u16 = 25000;

/// Control transport answering each request from a script
///
/// Queued replies are used first, one per request; `None` means the server
/// stays silent. Without a queued reply the request is answered with
/// `200 OK` echoing its CSeq and carrying [`SESSION_ID`].
#[derive(Default)]
pub struct ScriptedControl {
    sent: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Option<String>>>,
    replies: Mutex<VecDeque<Bytes>>,
    closed: AtomicBool,
}

impl ScriptedControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply to the next request with `response`
    pub fn reply_with(&self, response: &str) {
        self.script.lock().push_back(Some(response.to_string()));
    }

    /// Leave the next request unanswered
    pub fn stay_silent(&self) {
        self.script.lock().push_back(None);
    }

    /// Put `response` on the wire ahead of any reply to the next request,
    /// as a server answering a request the client already gave up on would
    pub fn send_late_reply(&self, response: &str) {
        self.replies.lock().push_back(Bytes::from(response.to_string()));
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn cseq_of(request: &str) -> u32 {
    request
        .lines()
        .find_map(|line| line.strip_prefix("CSeq: "))
        .and_then(|value| value.trim().parse().ok())
        .expect("request without CSeq")
}

pub fn ok_response(cseq: u32, session_id: &str) -> String {
    format!("RTSP/1.0 200 OK\r\nCSeq: {}\r\nSession: {}\r\n\r\n", cseq, session_id)
}

#[async_trait]
impl ControlTransport for ScriptedControl {
    async fn send(&self, request: &[u8]) -> ClientResult<()> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }

        let request = String::from_utf8(request.to_vec()).expect("request is text");
        let reply = match self.script.lock().pop_front() {
            Some(scripted) => scripted,
            None => Some(ok_response(cseq_of(&request), SESSION_ID)),
        };

        self.sent.lock().push(request);
        if let Some(reply) = reply {
            self.replies.lock().push_back(Bytes::from(reply));
        }
        Ok(())
    }

    async fn recv(&self) -> ClientResult<Bytes> {
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(reply) => Ok(reply),
            None => std::future::pending().await,
        }
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Media transport that never delivers a datagram
#[derive(Default)]
pub struct IdleMedia {
    closed: AtomicBool,
}

impl IdleMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTransport for IdleMedia {
    fn local_addr(&self) -> rstream_rtp_core::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], MEDIA_PORT)))
    }

    async fn recv_datagram(&self, _buf: &mut [u8]) -> rstream_rtp_core::Result<usize> {
        std::future::pending().await
    }

    async fn close(&self) -> rstream_rtp_core::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn discard_sink() -> Arc<dyn FrameSink> {
    Arc::new(|_pt: u8, _marker: bool, _seq: u16, _ts: u32, _payload: Bytes| {})
}

pub fn test_config() -> ClientConfig {
    ClientConfig::default().with_response_timeout_ms(200)
}

pub fn scripted_session() -> (RtspSession, Arc<ScriptedControl>, Arc<IdleMedia>) {
    let control = ScriptedControl::new();
    let media = IdleMedia::new();
    let session = RtspSession::new(test_config(), control.clone(), media.clone(), discard_sink());
    (session, control, media)
}
