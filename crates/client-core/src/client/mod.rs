//! Session management
//!
//! - **config** - [`ClientConfig`] with the network and timing settings
//! - **types** - [`SessionState`] and the allowed transitions
//! - **session** - [`RtspSession`], the control state machine driving the
//!   media receiver

pub mod config;
pub mod session;
pub mod types;

pub use config::{ClientConfig, DEFAULT_MAX_RESPONSE_SIZE, DEFAULT_RESPONSE_TIMEOUT_MS};
pub use session::RtspSession;
pub use types::SessionState;
