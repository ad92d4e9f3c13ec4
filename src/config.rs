use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;

/// Application configuration (file + `VOICE_ROOM__*` environment)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionDefaults,
    pub audio: AudioConfig,
    pub connection: ConnectionConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub display_name: Option<String>,
    pub translate_to: String,
    pub transcribe_to: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            display_name: None,
            translate_to: "en".to_string(),
            transcribe_to: "en".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_duration_ms: u64,
    pub analysis_window: usize,
    pub talk_threshold: f32,
    pub chunk_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 100,
            analysis_window: 512,
            talk_threshold: 10.0,
            chunk_duration_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// 0 disables the handshake timeout
    pub handshake_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Load from `path` (any extension the `config` crate understands, or
    /// none). A missing file falls back to defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VOICE_ROOM").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Build the session parameters for `room`
    pub fn session_config(&self, room: &str, display_name: String) -> SessionConfig {
        SessionConfig {
            display_name,
            room: room.to_string(),
            translate_to: self.session.translate_to.clone(),
            transcribe_to: self.session.transcribe_to.clone(),
            host: self.server.host.clone(),
            talk_threshold: self.audio.talk_threshold,
            chunk_duration: Duration::from_millis(self.audio.chunk_duration_ms),
            analysis_window: self.audio.analysis_window,
            handshake_timeout: match self.connection.handshake_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }
}
