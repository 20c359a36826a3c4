//! Control session state machine
//!
//! [`RtspSession`] issues one control command at a time, waits for the
//! server's answer and only then changes state. The media receiver is
//! started when PLAY succeeds and stopped before PAUSE or TEARDOWN complete,
//! so it never runs outside the PLAYING state.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use rstream_client_core::{ClientConfig, RtspSession};
//!
//! # tokio_test::block_on(async {
//! let config = ClientConfig::new("127.0.0.1:8554".parse().unwrap());
//! let sink = Arc::new(|_pt: u8, _marker: bool, seq: u16, _ts: u32, payload: Bytes| {
//!     println!("frame {} ({} bytes)", seq, payload.len());
//! });
//!
//! let mut session = RtspSession::connect(config, sink).await?;
//! session.setup("movie.mjpeg").await?;
//! session.play().await?;
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! session.teardown().await?;
//! session.close().await?;
//! # Ok::<(), rstream_client_core::ClientError>(())
//! # }).unwrap();
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use rstream_rtp_core::{
    FrameSink, MediaTransport, ReceiverStatus, ReceptionStats, RtpReceiver, UdpMediaTransport,
};
use tracing::{debug, error, info, warn};

use super::config::ClientConfig;
use super::types::SessionState;
use crate::error::{ClientError, ClientResult};
use crate::rtsp::{RtspMethod, RtspRequest, RtspResponse};
use crate::transport::{ControlTransport, TcpControlTransport};

/// Client side of one streaming session
pub struct RtspSession {
    config: ClientConfig,
    control: Arc<dyn ControlTransport>,
    media: Arc<dyn MediaTransport>,
    receiver: RtpReceiver,
    sink: Arc<dyn FrameSink>,

    state: SessionState,

    /// Last sequence number issued; never reset while the connection lives
    cseq: u32,

    session_id: Option<String>,
    resource: Option<String>,

    /// Receive loop failure collected when the loop was last stopped
    media_failure: Option<rstream_rtp_core::Error>,

    closed: bool,
}

impl RtspSession {
    /// Connect to the server and bind the local media socket
    pub async fn connect(config: ClientConfig, sink: Arc<dyn FrameSink>) -> ClientResult<Self> {
        config.validate()?;

        let control =
            TcpControlTransport::connect(config.server_addr, config.max_response_size).await?;
        let media = UdpMediaTransport::bind(config.media_bind_addr).await?;

        info!(
            "Connected to {}, receiving media on {}",
            config.server_addr,
            media.local_addr()?
        );

        Ok(Self::new(config, Arc::new(control), Arc::new(media), sink))
    }

    /// Build a session over already established transports
    pub fn new(
        config: ClientConfig,
        control: Arc<dyn ControlTransport>,
        media: Arc<dyn MediaTransport>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let receiver = RtpReceiver::new(config.receiver.clone(), media.clone());

        Self {
            config,
            control,
            media,
            receiver,
            sink,
            state: SessionState::Init,
            cseq: 0,
            session_id: None,
            resource: None,
            media_failure: None,
            closed: false,
        }
    }

    /// Ask the server to set up a session for `resource`
    pub async fn setup(&mut self, resource: &str) -> ClientResult<()> {
        self.check_command(RtspMethod::Setup)?;

        let client_port = self.media.local_addr()?.port();
        let cseq = self.next_cseq();
        let response = self
            .exchange(RtspRequest::setup(resource, cseq, client_port))
            .await?;

        let session_id = response
            .session_id()
            .ok_or(ClientError::MissingSessionId)?
            .to_string();

        info!("Session {} set up for {}", session_id, resource);
        self.session_id = Some(session_id);
        self.resource = Some(resource.to_string());
        self.transition(SessionState::Ready);
        Ok(())
    }

    /// Start playback and the media receiver
    pub async fn play(&mut self) -> ClientResult<()> {
        self.check_command(RtspMethod::Play)?;

        let response = self.exchange_in_session(RtspMethod::Play).await?;
        self.check_session(&response)?;

        self.receiver.start(self.sink.clone())?;
        self.media_failure = None;

        self.transition(SessionState::Playing);
        Ok(())
    }

    /// Pause playback; the receiver is stopped before the state changes
    pub async fn pause(&mut self) -> ClientResult<()> {
        self.check_command(RtspMethod::Pause)?;

        let response = self.exchange_in_session(RtspMethod::Pause).await?;
        self.check_session(&response)?;

        self.stop_receiver().await;

        self.transition(SessionState::Ready);
        Ok(())
    }

    /// End the session on the server and drop all receive state
    pub async fn teardown(&mut self) -> ClientResult<()> {
        self.check_command(RtspMethod::Teardown)?;

        let response = self.exchange_in_session(RtspMethod::Teardown).await?;
        self.check_session(&response)?;

        self.stop_receiver().await;
        self.receiver.reset()?;

        if let Some(session_id) = self.session_id.take() {
            info!("Session {} torn down", session_id);
        }
        self.resource = None;
        self.transition(SessionState::Init);
        Ok(())
    }

    /// Stop the receiver and release both channels
    ///
    /// Safe to call repeatedly. Every command after this fails with
    /// [`ClientError::ConnectionClosed`].
    pub async fn close(&mut self) -> ClientResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.stop_receiver().await;

        let media_result = self.media.close().await.map_err(ClientError::from);
        let control_result = self.control.close().await;

        info!("Session closed in state {}", self.state);
        media_result.and(control_result)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last sequence number sent
    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn receiver_status(&self) -> ReceiverStatus {
        self.receiver.status()
    }

    /// Reception statistics of the current session
    pub fn stats(&self) -> ReceptionStats {
        self.receiver.stats()
    }

    /// Failure that ended the receive loop before it was last stopped
    pub fn media_failure(&self) -> Option<&rstream_rtp_core::Error> {
        self.media_failure.as_ref()
    }

    /// Local media address announced to the server
    pub fn media_addr(&self) -> ClientResult<SocketAddr> {
        Ok(self.media.local_addr()?)
    }

    fn check_command(&self, command: RtspMethod) -> ClientResult<()> {
        if self.closed {
            return Err(ClientError::ConnectionClosed);
        }
        if !self.state.permits(command) {
            debug!("Rejecting {} in state {}", command, self.state);
            return Err(ClientError::InvalidStateTransition {
                command,
                state: self.state,
            });
        }
        Ok(())
    }

    fn next_cseq(&mut self) -> u32 {
        self.cseq += 1;
        self.cseq
    }

    fn transition(&mut self, next: SessionState) {
        info!("Session state {} -> {}", self.state, next);
        self.state = next;
    }

    async fn exchange_in_session(&mut self, method: RtspMethod) -> ClientResult<RtspResponse> {
        let session_id = self
            .session_id
            .clone()
            .ok_or(ClientError::MissingSessionId)?;
        let resource = self.resource.clone().unwrap_or_default();
        let cseq = self.next_cseq();

        self.exchange(RtspRequest::in_session(method, resource, cseq, session_id))
            .await
    }

    /// Send a request and wait for a successful response
    ///
    /// Replies to earlier requests, left over from a timed-out exchange, are
    /// skipped. The whole wait is bounded by the response timeout.
    async fn exchange(&self, request: RtspRequest) -> ClientResult<RtspResponse> {
        debug!("Sending {} (CSeq {})", request.method, request.cseq);
        self.control.send(&request.encode()).await?;

        let deadline = tokio::time::Instant::now() + self.config.response_timeout();
        let response = loop {
            let raw = tokio::time::timeout_at(deadline, self.control.recv())
                .await
                .map_err(|_| ClientError::ResponseTimeout {
                    command: request.method,
                    timeout_ms: self.config.response_timeout_ms,
                })??;

            let response = RtspResponse::parse(&raw)?;
            match response.cseq()? {
                Some(cseq) if cseq < request.cseq => {
                    warn!(
                        "Discarding stale response CSeq {} while waiting for CSeq {}",
                        cseq, request.cseq
                    );
                }
                Some(cseq) if cseq > request.cseq => {
                    return Err(ClientError::malformed_response(format!(
                        "response CSeq {} is ahead of request CSeq {}",
                        cseq, request.cseq
                    )));
                }
                _ => break response,
            }
        };

        if !response.is_success() {
            warn!(
                "{} rejected: {} {}",
                request.method, response.status_code, response.reason_phrase
            );
            return Err(ClientError::ServerRejected {
                status_code: response.status_code,
                reason_phrase: response.reason_phrase,
            });
        }

        Ok(response)
    }

    /// A response naming another session is ignored as a whole
    fn check_session(&self, response: &RtspResponse) -> ClientResult<()> {
        match (self.session_id.as_deref(), response.session_id()) {
            (Some(expected), Some(received)) if expected != received => {
                warn!("Ignoring response for session {} (ours is {})", received, expected);
                Err(ClientError::SessionMismatch {
                    expected: expected.to_string(),
                    received: received.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn stop_receiver(&mut self) {
        if let Err(e) = self.receiver.stop().await {
            error!("Receive loop had failed: {}", e);
            self.media_failure = Some(e);
        }
    }
}
