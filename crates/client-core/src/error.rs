//! Error handling for the streaming client
//!
//! Control-path failures are reported through [`ClientError`]. A failed
//! command never leaves the session half-way between two states: either the
//! command completes and the state changes, or it fails and the state is
//! exactly what it was before.

use thiserror::Error;

use crate::client::SessionState;
use crate::rtsp::RtspMethod;

/// Result type alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors raised by the control session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Command issued from a state that does not permit it; nothing was sent
    #[error("Cannot {command} while {state}")]
    InvalidStateTransition {
        command: RtspMethod,
        state: SessionState,
    },

    /// The server answered with a status other than 200
    #[error("Server rejected request: {status_code} {reason_phrase}")]
    ServerRejected {
        status_code: u16,
        reason_phrase: String,
    },

    /// Connect, send or receive failure on the control channel
    #[error("Control transport failure: {reason}")]
    TransportFailure { reason: String },

    /// No response arrived within the configured bound
    #[error("No response to {command} within {timeout_ms}ms")]
    ResponseTimeout { command: RtspMethod, timeout_ms: u64 },

    /// The response carried a different session identifier
    #[error("Session mismatch: expected {expected}, received {received}")]
    SessionMismatch { expected: String, received: String },

    /// The response could not be parsed
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// A successful SETUP response did not assign a session
    #[error("Server did not assign a session identifier")]
    MissingSessionId,

    /// The session has been closed
    #[error("Session is closed")]
    ConnectionClosed,

    /// Failure reported by the media receiver
    #[error("Media error: {0}")]
    Media(#[from] rstream_rtp_core::Error),

    /// A configuration value is unusable
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

impl ClientError {
    pub fn transport_failure(reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            reason: reason.into(),
        }
    }

    pub fn malformed_response(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the session stays usable after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Rejected locally or by the server, connection intact
            Self::InvalidStateTransition { .. }
            | Self::ServerRejected { .. }
            | Self::SessionMismatch { .. }
            | Self::MissingSessionId => true,

            // The connection can no longer be trusted
            Self::TransportFailure { .. }
            | Self::ResponseTimeout { .. }
            | Self::MalformedResponse { .. }
            | Self::ConnectionClosed => false,

            Self::Media(e) => e.is_packet_local(),

            Self::InvalidConfiguration { .. } => false,
        }
    }

    /// Check if the caller has to close the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. }
                | Self::ResponseTimeout { .. }
                | Self::MalformedResponse { .. }
                | Self::ConnectionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let rejected = ClientError::ServerRejected {
            status_code: 454,
            reason_phrase: "Session Not Found".to_string(),
        };
        assert!(rejected.is_recoverable());
        assert!(!rejected.is_fatal());

        let timeout = ClientError::ResponseTimeout {
            command: RtspMethod::Play,
            timeout_ms: 5000,
        };
        assert!(timeout.is_fatal());
        assert!(!timeout.is_recoverable());

        let invalid = ClientError::InvalidStateTransition {
            command: RtspMethod::Pause,
            state: SessionState::Init,
        };
        assert!(invalid.is_recoverable());
        assert_eq!(invalid.to_string(), "Cannot PAUSE while INIT");
    }

    #[test]
    fn test_media_error_conversion() {
        let err: ClientError = rstream_rtp_core::Error::Transport("closed".to_string()).into();
        assert!(matches!(err, ClientError::Media(_)));
        assert!(!err.is_recoverable());
        assert!(!err.is_fatal());
    }
}
