//! Error kinds surfaced by a room session.

use thiserror::Error;

/// Errors produced by the session API and reported on the event bus.
///
/// `Clone` so that asynchronous failures (peer close, capture loss) can be
/// broadcast to every subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Session configuration rejected before any resource was acquired
    #[error("Invalid session config: {0}")]
    InvalidConfig(String),

    /// Microphone denied, absent, or revoked mid-session
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// `connect` called while a session is already in progress
    #[error("A session is already connected or connecting")]
    AlreadyConnected,

    /// The duplex connection could not be opened
    #[error("Failed to open transport: {0}")]
    TransportOpenFailed(String),

    /// `disconnect` arrived while the session was still being set up
    #[error("Connect cancelled by disconnect")]
    ConnectCancelled,

    /// The room never confirmed the join within the configured timeout
    #[error("Handshake not confirmed within {timeout_ms}ms")]
    HandshakeTimeout { timeout_ms: u64 },

    /// Peer or network closed the connection
    #[error("Transport closed: {0}")]
    TransportClosed(String),

    /// Low-level I/O fault on the connection
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Inbound payload that could not be decoded (logged, never fatal)
    #[error("Malformed inbound message: {0}")]
    MalformedInboundMessage(String),
}

impl SessionError {
    /// Whether this error ends the session
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::MalformedInboundMessage(_))
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
