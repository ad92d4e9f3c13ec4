//! Native microphone capture via cpal
//!
//! cpal streams are not `Send`, so each capture owns a dedicated thread that
//! builds the stream, keeps it alive, and drops it on stop. The data callback
//! cuts samples into frames and forwards them on the session's channel.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::frames::FrameAssembler;

enum Control {
    Stop,
    Failed(String),
}

struct CaptureThread {
    control: std_mpsc::Sender<Control>,
    handle: JoinHandle<()>,
}

/// Default input device of the default host
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    capture: Option<CaptureThread>,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            capture: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            bail!("Already capturing");
        }

        let (frames_tx, frames_rx) = mpsc::channel(100);
        let (control_tx, control_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let config = self.config.clone();
        let errors = control_tx.clone();
        let handle = std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || run_capture(config, frames_tx, errors, control_rx, ready_tx))
            .context("Failed to spawn microphone thread")?;

        match ready_rx.await {
            Ok(Ok(())) => {
                self.capture = Some(CaptureThread {
                    control: control_tx,
                    handle,
                });
                Ok(frames_rx)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow!("Microphone thread exited during startup")),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(capture) = self.capture.take() else {
            return Ok(());
        };

        let _ = capture.control.send(Control::Stop);
        tokio::task::spawn_blocking(move || capture.handle.join())
            .await
            .context("Failed to join microphone thread")?
            .map_err(|_| anyhow!("Microphone thread panicked"))?;

        info!("Microphone released");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|capture| !capture.handle.is_finished())
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        if let Some(capture) = self.capture.take() {
            let _ = capture.control.send(Control::Stop);
        }
    }
}

/// Body of the capture thread: open, report readiness, hold until told to stop
fn run_capture(
    config: AudioBackendConfig,
    frames: mpsc::Sender<AudioFrame>,
    errors: std_mpsc::Sender<Control>,
    control: std_mpsc::Receiver<Control>,
    ready: oneshot::Sender<Result<()>>,
) {
    let stream = match open_stream(&config, frames, errors) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(())).is_err() {
        debug!("Microphone start abandoned, closing stream");
        return;
    }

    match control.recv() {
        Ok(Control::Failed(reason)) => warn!("Microphone stream failed: {}", reason),
        Ok(Control::Stop) | Err(_) => debug!("Microphone stop requested"),
    }

    // Dropping the stream releases the device and closes the frame channel
    drop(stream);
}

fn open_stream(
    config: &AudioBackendConfig,
    frames: mpsc::Sender<AudioFrame>,
    errors: std_mpsc::Sender<Control>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No default input device available")?;

    let supported = device
        .default_input_config()
        .context("Failed to query input device configuration")?;
    let format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();

    let assembler = FrameAssembler::new(stream_config.sample_rate, stream_config.channels, config);
    info!(
        "Microphone opened: {:?} {}Hz {}ch, delivering {}Hz {}ch",
        format,
        stream_config.sample_rate,
        stream_config.channels,
        assembler.output_rate(),
        assembler.output_channels()
    );

    let stream = match format {
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, assembler, frames, errors, |s| s)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, assembler, frames, errors, |s| {
            (s as i32 - 32_768) as i16
        })?,
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, assembler, frames, errors, |s| {
            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })?,
        other => bail!("Unsupported microphone sample format: {:?}", other),
    };

    stream.play().context("Failed to start microphone stream")?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut assembler: FrameAssembler,
    frames: mpsc::Sender<AudioFrame>,
    errors: std_mpsc::Sender<Control>,
    convert: fn(T) -> i16,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + Send + 'static,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data.iter().map(|&s| convert(s)).collect();
                for frame in assembler.push(&samples) {
                    // Full queue: drop the frame rather than block the audio thread
                    let _ = frames.try_send(frame);
                }
            },
            move |err| {
                let _ = errors.send(Control::Failed(err.to_string()));
            },
            None,
        )
        .context("Failed to build microphone stream")?;

    Ok(stream)
}
