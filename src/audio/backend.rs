use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

use super::file::FileBackend;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration covered by this frame in milliseconds
    pub fn duration_ms(&self) -> u64 {
        let per_channel = self.samples.len() as u64 / self.channels.max(1) as u64;
        per_channel * 1000 / self.sample_rate.max(1) as u64
    }
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate
    pub target_sample_rate: u32,
    /// Target channel count; 1 downmixes, otherwise source channels pass through
    pub target_channels: u16,
    /// Duration of each delivered frame in milliseconds
    pub frame_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            target_channels: 1, // Mono
            frame_duration_ms: 100,
        }
    }
}

/// Audio capture backend trait
///
/// This is the microphone provider seen by a session: `start` acquires the
/// device and `stop` releases it. A session owns exactly one backend at a time.
///
/// The frame channel closing while the backend is still meant to be capturing
/// means the device went away (revoked, unplugged, hardware fault).
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and release the device. Safe to call twice.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend based on source and configuration
    pub fn create(
        source: AudioSource,
        config: AudioBackendConfig,
    ) -> Result<Box<dyn AudioBackend>> {
        match source {
            #[cfg(feature = "microphone")]
            AudioSource::Microphone => Ok(Box::new(super::microphone::MicrophoneBackend::new(config))),

            #[cfg(not(feature = "microphone"))]
            AudioSource::Microphone => {
                anyhow::bail!("Built without microphone support (enable the `microphone` feature)")
            }

            AudioSource::File(path) => Ok(Box::new(FileBackend::new(path, config))),
        }
    }
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Default input device (requires the `microphone` feature)
    Microphone,
    /// WAV file played back in real time
    File(PathBuf),
}
