//! Connection lifecycle state machine
//!
//! `Disconnected -> Connecting -> AwaitingHandshake -> Active`, and any state
//! back to `Disconnected` on close, error, or explicit disconnect. Forward
//! transitions never skip back; only teardown resets.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::messages::InboundMessage;
use super::transport::{Transport, TransportEvent};
use crate::error::SessionError;
use crate::session::{EventBus, SessionConfig, SessionEvent};

/// Upper bound on a graceful transport close
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHandshake,
    Active,
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }
}

/// Build `ws://<host>/<room>?name=..&translate_to=..&transcribe_to=..`
///
/// The room is pushed as a single percent-encoded path segment.
pub fn join_url(config: &SessionConfig) -> Result<Url, SessionError> {
    let host = config.host.trim_end_matches('/');
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("ws://{}", host)
    };

    let mut url = Url::parse(&base)
        .map_err(|e| SessionError::InvalidConfig(format!("invalid host '{}': {}", config.host, e)))?;

    url.path_segments_mut()
        .map_err(|_| SessionError::InvalidConfig(format!("host '{}' cannot carry a path", config.host)))?
        .pop_if_empty()
        .push(&config.room);

    url.query_pairs_mut()
        .append_pair("name", &config.display_name)
        .append_pair("translate_to", &config.translate_to)
        .append_pair("transcribe_to", &config.transcribe_to);

    Ok(url)
}

/// Owns the transport and advances the connection state
pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    bus: EventBus,
    participant_count: Option<u64>,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn Transport>, bus: EventBus) -> Self {
        Self {
            transport,
            bus,
            participant_count: None,
        }
    }

    /// Last participant count pushed by the room
    pub fn participant_count(&self) -> Option<u64> {
        self.participant_count
    }

    pub fn state(&self) -> ConnectionState {
        self.bus.state()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    /// Open the transport: `Connecting`, then `AwaitingHandshake` once open.
    ///
    /// On failure the state returns to `Disconnected`.
    pub async fn open(
        &mut self,
        config: &SessionConfig,
    ) -> Result<mpsc::Receiver<TransportEvent>, SessionError> {
        let url = match join_url(config) {
            Ok(url) => url,
            Err(e) => {
                self.bus.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.bus.set_state(ConnectionState::Connecting);

        match self.transport.open(&url).await {
            Ok(events) => {
                info!(
                    "{} transport open for room '{}', awaiting handshake",
                    self.transport.name(),
                    config.room
                );
                self.bus.set_state(ConnectionState::AwaitingHandshake);
                Ok(events)
            }
            Err(e) => {
                warn!("Transport open failed: {}", e);
                self.bus.set_state(ConnectionState::Disconnected);
                Err(match e {
                    SessionError::TransportOpenFailed(_) => e,
                    other => SessionError::TransportOpenFailed(other.to_string()),
                })
            }
        }
    }

    /// Process one transport event.
    ///
    /// Returns the terminal error when the transport closed or failed; the
    /// caller is responsible for teardown.
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<(), SessionError> {
        match event {
            TransportEvent::Text(text) => {
                self.handle_text(&text);
                Ok(())
            }
            TransportEvent::Binary(data) => {
                debug!("Ignoring inbound binary frame ({} bytes)", data.len());
                Ok(())
            }
            TransportEvent::Closed(reason) => {
                info!("Transport closed: {}", reason);
                Err(SessionError::TransportClosed(reason))
            }
            TransportEvent::Error(reason) => {
                warn!("Transport error: {}", reason);
                Err(SessionError::TransportError(reason))
            }
        }
    }

    /// Decode and dispatch one text frame. Malformed input is logged and dropped.
    pub fn handle_text(&mut self, text: &str) {
        let messages = match InboundMessage::decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                warn!("{} ({} bytes ignored)", e, text.len());
                return;
            }
        };

        for message in messages {
            let connected = message.is_handshake_connected();
            match message {
                InboundMessage::HandshakeStatus(status) => {
                    if connected && self.state() == ConnectionState::AwaitingHandshake {
                        info!("Handshake confirmed, connection active");
                        self.bus.set_state(ConnectionState::Active);
                    } else {
                        debug!("Handshake status '{}' in state {:?}", status, self.state());
                    }
                }
                InboundMessage::Count(count) => {
                    info!("Participants in room: {}", count);
                    self.participant_count = Some(count);
                    self.bus.emit(SessionEvent::ParticipantCount(count));
                }
                InboundMessage::Participants(names) => {
                    debug!("Participant list: {:?}", names);
                    self.bus.emit(SessionEvent::Participants(names));
                }
                InboundMessage::GenericMessage(text) => {
                    info!("Room message: {}", text);
                    self.bus.emit(SessionEvent::Message(text));
                }
                InboundMessage::Unrecognized(raw) => {
                    warn!("Ignoring unrecognized room message: {}", raw);
                }
            }
        }
    }

    /// Send one chunk. Callers gate on [`is_active`](Self::is_active) first.
    pub async fn send_chunk(&mut self, payload: Vec<u8>) -> Result<(), SessionError> {
        self.transport.send_binary(payload).await
    }

    /// Close the transport and mark the connection `Disconnected`.
    ///
    /// The state is reset even when the close itself fails or stalls past
    /// [`CLOSE_TIMEOUT`].
    pub async fn close(&mut self) -> Result<(), SessionError> {
        let result = match tokio::time::timeout(CLOSE_TIMEOUT, self.transport.close()).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::TransportError(format!(
                "close not acknowledged within {}ms",
                CLOSE_TIMEOUT.as_millis()
            ))),
        };
        self.bus.set_state(ConnectionState::Disconnected);
        result
    }
}
