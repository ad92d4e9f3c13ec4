use tracing::warn;

use super::backend::{AudioBackendConfig, AudioFrame};

/// Cuts a raw interleaved sample stream into fixed-duration `AudioFrame`s
///
/// Shared by every capture backend so frames look the same whatever the
/// source. Input is converted on the way through:
/// - `target_channels == 1` averages all source channels into one
/// - a source rate that is an integer multiple of the target is decimated
///
/// Any other combination passes through at the source format.
pub struct FrameAssembler {
    source_channels: usize,
    output_rate: u32,
    output_channels: u16,
    downmix: bool,
    step: usize,
    frame_ms: u64,
    /// Source-rate sample frames per output frame
    frame_len: usize,
    pending: Vec<i16>,
    timestamp_ms: u64,
}

impl FrameAssembler {
    pub fn new(source_rate: u32, source_channels: u16, config: &AudioBackendConfig) -> Self {
        let source_rate = source_rate.max(1);
        let source_channels = source_channels.max(1);
        let target_rate = config.target_sample_rate;

        let downmix = config.target_channels == 1 && source_channels > 1;
        let output_channels = if downmix { 1 } else { source_channels };
        if output_channels != config.target_channels {
            warn!(
                "Cannot convert {} channels to {}, passing source channels through",
                source_channels, config.target_channels
            );
        }

        let (output_rate, step) = if target_rate == 0 || target_rate == source_rate {
            (source_rate, 1)
        } else if source_rate % target_rate == 0 {
            (target_rate, (source_rate / target_rate) as usize)
        } else {
            warn!(
                "Cannot decimate {}Hz to {}Hz, keeping source rate",
                source_rate, target_rate
            );
            (source_rate, 1)
        };

        let frame_ms = config.frame_duration_ms.max(1);
        let raw_len = (source_rate as u64 * frame_ms / 1000).max(1) as usize;
        let frame_len = raw_len.div_ceil(step) * step;

        Self {
            source_channels: source_channels as usize,
            output_rate,
            output_channels,
            downmix,
            step,
            frame_ms,
            frame_len,
            pending: Vec::with_capacity(frame_len * output_channels as usize),
            timestamp_ms: 0,
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    /// Append source samples; returns every frame they complete
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioFrame> {
        if self.downmix {
            let channels = self.source_channels;
            self.pending.extend(samples.chunks_exact(channels).map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            }));
        } else {
            self.pending.extend_from_slice(samples);
        }

        let chunk = self.frame_len * self.output_channels as usize;
        let mut frames = Vec::new();
        while self.pending.len() >= chunk {
            let raw: Vec<i16> = self.pending.drain(..chunk).collect();
            frames.push(self.emit(&raw, self.frame_ms));
        }
        frames
    }

    /// Emit whatever is buffered as a short final frame
    pub fn flush(&mut self) -> Option<AudioFrame> {
        if self.pending.is_empty() {
            return None;
        }

        let raw = std::mem::take(&mut self.pending);
        let per_channel = (raw.len() / self.output_channels as usize) as u64;
        let source_rate = self.output_rate as u64 * self.step as u64;
        Some(self.emit(&raw, per_channel * 1000 / source_rate))
    }

    fn emit(&mut self, raw: &[i16], advance_ms: u64) -> AudioFrame {
        let channels = self.output_channels as usize;
        let samples = if self.step == 1 {
            raw.to_vec()
        } else {
            raw.chunks(channels)
                .step_by(self.step)
                .flatten()
                .copied()
                .collect()
        };

        let frame = AudioFrame {
            samples,
            sample_rate: self.output_rate,
            channels: self.output_channels,
            timestamp_ms: self.timestamp_ms,
        };
        self.timestamp_ms += advance_ms;
        frame
    }
}
