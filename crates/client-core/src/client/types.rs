//! Session state and the transition table
//!
//! ```text
//!          SETUP            PLAY
//!   INIT ─────────▶ READY ─────────▶ PLAYING
//!     ▲               ▲  ◀─────────    │
//!     │               │     PAUSE      │
//!     └── TEARDOWN ───┴────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rtsp::RtspMethod;

/// Protocol state of a control session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// No session on the server
    #[default]
    Init,
    /// Session set up, media stopped
    Ready,
    /// Media flowing
    Playing,
}

impl SessionState {
    /// State reached when `method` succeeds from this state
    ///
    /// `None` when the method is not allowed here.
    pub fn on_success(self, method: RtspMethod) -> Option<SessionState> {
        match (self, method) {
            (Self::Init, RtspMethod::Setup) => Some(Self::Ready),
            (Self::Ready, RtspMethod::Play) => Some(Self::Playing),
            (Self::Playing, RtspMethod::Pause) => Some(Self::Ready),
            (Self::Ready | Self::Playing, RtspMethod::Teardown) => Some(Self::Init),
            _ => None,
        }
    }

    pub fn permits(self, method: RtspMethod) -> bool {
        self.on_success(method).is_some()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Ready => write!(f, "READY"),
            Self::Playing => write!(f, "PLAYING"),
        }
    }
}
