use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use super::events::ChunkOutcome;
use crate::ws::ConnectionState;

/// Statistics about the current (or last) session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Connection state at the time of the snapshot
    pub state: ConnectionState,

    /// When the session was started, if ever
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the session started
    pub duration_secs: f64,

    /// Chunks handed to the transport
    pub chunks_sent: u64,

    /// Chunks recorded but not transmitted
    pub chunks_dropped: u64,

    /// Payload bytes handed to the transport
    pub bytes_sent: u64,

    /// Last participant count pushed by the room
    pub participant_count: Option<u64>,

    /// Whether the speaker is currently classified as talking
    pub talking: bool,
}

/// Live counters updated by the session task
#[derive(Debug, Default)]
pub struct SessionCounters {
    started_at: Mutex<Option<DateTime<Utc>>>,
    chunks_sent: AtomicU64,
    chunks_dropped: AtomicU64,
    bytes_sent: AtomicU64,
    participant_count: AtomicU64,
    has_participant_count: AtomicBool,
    talking: AtomicBool,
}

impl SessionCounters {
    /// Zero everything and stamp a new start time
    pub fn reset(&self) {
        if let Ok(mut started_at) = self.started_at.lock() {
            *started_at = Some(Utc::now());
        }
        self.chunks_sent.store(0, Ordering::SeqCst);
        self.chunks_dropped.store(0, Ordering::SeqCst);
        self.bytes_sent.store(0, Ordering::SeqCst);
        self.participant_count.store(0, Ordering::SeqCst);
        self.has_participant_count.store(false, Ordering::SeqCst);
        self.talking.store(false, Ordering::SeqCst);
    }

    pub fn record_chunk(&self, outcome: ChunkOutcome, bytes: usize) {
        if outcome.is_sent() {
            self.chunks_sent.fetch_add(1, Ordering::SeqCst);
            self.bytes_sent.fetch_add(bytes as u64, Ordering::SeqCst);
        } else {
            self.chunks_dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn set_participant_count(&self, count: u64) {
        self.participant_count.store(count, Ordering::SeqCst);
        self.has_participant_count.store(true, Ordering::SeqCst);
    }

    pub fn set_talking(&self, talking: bool) {
        self.talking.store(talking, Ordering::SeqCst);
    }

    pub fn snapshot(&self, state: ConnectionState) -> SessionStats {
        let started_at = self.started_at.lock().ok().and_then(|s| *s);
        let duration_secs = started_at
            .map(|t| Utc::now().signed_duration_since(t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        SessionStats {
            state,
            started_at,
            duration_secs,
            chunks_sent: self.chunks_sent.load(Ordering::SeqCst),
            chunks_dropped: self.chunks_dropped.load(Ordering::SeqCst),
            bytes_sent: self.bytes_sent.load(Ordering::SeqCst),
            participant_count: self
                .has_participant_count
                .load(Ordering::SeqCst)
                .then(|| self.participant_count.load(Ordering::SeqCst)),
            talking: self.talking.load(Ordering::SeqCst),
        }
    }
}
