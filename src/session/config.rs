use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::chunk::DEFAULT_CHUNK_DURATION;
use crate::audio::energy::DEFAULT_WINDOW;
use crate::audio::talking::DEFAULT_TALK_THRESHOLD;
use crate::error::SessionError;

/// Configuration for one room session, read-only once connected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name shown to other participants
    pub display_name: String,

    /// Room to join (must be non-empty)
    pub room: String,

    /// Locale the room should translate this speaker into
    pub translate_to: String,

    /// Locale the room should transcribe this speaker in
    pub transcribe_to: String,

    /// Room server address, `host:port` or a full `ws://` / `wss://` base
    pub host: String,

    /// RMS above which a window counts as speech (8-bit-centered scale)
    pub talk_threshold: f32,

    /// Duration of each transmitted chunk
    pub chunk_duration: Duration,

    /// Samples per analysis window
    pub analysis_window: usize,

    /// Give up if the room does not confirm the join in time (`None` = wait forever)
    pub handshake_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(room: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    /// Reject configs that must never reach the transport
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.room.trim().is_empty() {
            return Err(SessionError::InvalidConfig("room must not be empty".to_string()));
        }
        if self.analysis_window == 0 {
            return Err(SessionError::InvalidConfig(
                "analysis window must hold at least one sample".to_string(),
            ));
        }
        if self.chunk_duration.is_zero() {
            return Err(SessionError::InvalidConfig(
                "chunk duration must be positive".to_string(),
            ));
        }
        if !self.talk_threshold.is_finite() || self.talk_threshold < 0.0 {
            return Err(SessionError::InvalidConfig(format!(
                "talk threshold must be a non-negative number, got {}",
                self.talk_threshold
            )));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "Anonymous".to_string(),
            room: String::new(),
            translate_to: "en".to_string(),
            transcribe_to: "en".to_string(),
            host: "127.0.0.1:8080".to_string(),
            talk_threshold: DEFAULT_TALK_THRESHOLD,
            chunk_duration: DEFAULT_CHUNK_DURATION, // 500ms
            analysis_window: DEFAULT_WINDOW,        // 512 samples
            handshake_timeout: Some(Duration::from_secs(10)),
        }
    }
}
