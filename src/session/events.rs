use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::error::SessionError;
use crate::ws::ConnectionState;

/// Capacity of the event broadcast channel
const EVENT_CAPACITY: usize = 256;

/// What happened to a completed chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Handed to the transport
    Sent,
    /// Dropped because the speaker was idle
    DroppedSilent,
    /// Dropped because the connection was not active
    DroppedNotActive,
    /// Dropped because no full analysis window existed yet
    NoReading,
}

impl ChunkOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ChunkOutcome::Sent)
    }
}

/// Notifications pushed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    TalkStarted,
    TalkStopped,
    ParticipantCount(u64),
    Participants(Vec<String>),
    Message(String),
    Chunk { index: usize, outcome: ChunkOutcome },
    Error(SessionError),
}

/// Subscribe/notify hub shared by the controller and its session task
///
/// Connection state lives in a `watch` channel so readers always see the
/// latest value; every change is also broadcast as `StateChanged`.
#[derive(Clone)]
pub struct EventBus {
    state_tx: Arc<watch::Sender<ConnectionState>>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state_tx: Arc::new(state_tx),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Move to `state`, announcing it if it differs from the current one
    pub fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!("Connection state: {:?} -> {:?}", previous, state);
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    /// Atomically claim `Disconnected -> Connecting`.
    ///
    /// Returns `false` (and changes nothing) if a session is already underway.
    pub fn try_begin_connect(&self) -> bool {
        let claimed = self.state_tx.send_if_modified(|state| {
            if state.is_disconnected() {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });

        if claimed {
            info!("Connection state: Disconnected -> Connecting");
            self.emit(SessionEvent::StateChanged(ConnectionState::Connecting));
        }

        claimed
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        if self.events_tx.send(event).is_err() {
            debug!("Session event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
