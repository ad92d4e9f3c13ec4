use anyhow::{Context, Result};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::AudioFrame;

/// Default chunk duration
pub const DEFAULT_CHUNK_DURATION: Duration = Duration::from_millis(500);

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Wall-clock duration of each chunk (default: 500ms)
    pub chunk_duration: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_duration: DEFAULT_CHUNK_DURATION,
        }
    }
}

/// A completed chunk ready for the gate
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    /// Chunk number (0-indexed, per session)
    pub chunk_index: usize,
    /// Start time in milliseconds since capture started
    pub start_ms: u64,
    /// End of the last frame's audio in milliseconds since capture started
    pub end_ms: u64,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Number of samples in this chunk
    pub sample_count: usize,
    /// Self-contained WAV payload, one binary frame on the wire
    pub payload: Vec<u8>,
}

/// Aggregates captured frames into fixed-duration WAV chunks
///
/// Recording is continuous: every frame lands in a chunk regardless of talk
/// state. Whether a finished chunk is transmitted is decided by the caller.
pub struct ChunkEncoder {
    config: ChunkConfig,
    current_chunk: Option<ChunkWriter>,
    chunk_index: usize,
}

impl ChunkEncoder {
    pub fn new(config: ChunkConfig) -> Self {
        info!(
            "Chunk encoder initialized ({}ms chunks)",
            config.chunk_duration.as_millis()
        );

        Self {
            config,
            current_chunk: None,
            chunk_index: 0,
        }
    }

    /// Add a frame; returns every chunk completed by it
    ///
    /// A format change mid-chunk closes the current chunk early so a payload
    /// never mixes sample rates.
    pub fn push(&mut self, frame: &AudioFrame) -> Result<Vec<EncodedChunk>> {
        let mut completed = Vec::new();

        if let Some(chunk) = &self.current_chunk {
            if chunk.sample_rate != frame.sample_rate || chunk.channels != frame.channels {
                warn!(
                    "Frame format changed ({}Hz/{}ch -> {}Hz/{}ch), closing chunk early",
                    chunk.sample_rate, chunk.channels, frame.sample_rate, frame.channels
                );
                if let Some(chunk) = self.current_chunk.take() {
                    completed.push(chunk.finish()?);
                }
            }
        }

        if self.current_chunk.is_none() {
            self.current_chunk = Some(self.start_new_chunk(frame));
        }

        let chunk_duration_ms = self.config.chunk_duration.as_millis() as u64;
        let is_complete = match &mut self.current_chunk {
            Some(chunk) => {
                chunk.write_frame(frame);
                chunk.covered_until_ms.saturating_sub(chunk.start_ms) >= chunk_duration_ms
            }
            None => false,
        };

        if is_complete {
            if let Some(chunk) = self.current_chunk.take() {
                let encoded = chunk.finish()?;
                debug!(
                    "Chunk {} ready: {:.1}s - {:.1}s ({} samples, {} bytes)",
                    encoded.chunk_index,
                    encoded.start_ms as f64 / 1000.0,
                    encoded.end_ms as f64 / 1000.0,
                    encoded.sample_count,
                    encoded.payload.len()
                );
                completed.push(encoded);
            }
        }

        Ok(completed)
    }

    /// Drop the partially filled chunk without encoding it
    pub fn discard(&mut self) {
        if let Some(chunk) = self.current_chunk.take() {
            debug!(
                "Discarding partial chunk {} ({} samples)",
                chunk.chunk_index,
                chunk.samples.len()
            );
        }
    }

    /// Number of chunks started so far
    pub fn chunks_started(&self) -> usize {
        self.chunk_index
    }

    fn start_new_chunk(&mut self, frame: &AudioFrame) -> ChunkWriter {
        let chunk = ChunkWriter::new(
            self.chunk_index,
            frame.timestamp_ms,
            frame.sample_rate,
            frame.channels,
        );
        self.chunk_index += 1;
        chunk
    }
}

/// Buffers one chunk's samples until it is encoded
struct ChunkWriter {
    chunk_index: usize,
    start_ms: u64,
    covered_until_ms: u64,
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl ChunkWriter {
    fn new(chunk_index: usize, start_ms: u64, sample_rate: u32, channels: u16) -> Self {
        Self {
            chunk_index,
            start_ms,
            covered_until_ms: start_ms,
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    fn write_frame(&mut self, frame: &AudioFrame) {
        self.samples.extend_from_slice(&frame.samples);
        self.covered_until_ms = frame.timestamp_ms + frame.duration_ms();
    }

    fn finish(self) -> Result<EncodedChunk> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .context("Failed to create WAV writer")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV chunk")?;
        }

        Ok(EncodedChunk {
            chunk_index: self.chunk_index,
            start_ms: self.start_ms,
            end_ms: self.covered_until_ms,
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample_count: self.samples.len(),
            payload: cursor.into_inner(),
        })
    }
}
