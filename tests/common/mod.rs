// Channel-driven fakes for the audio device and the room transport
//
// Both fakes append to a shared journal so tests can assert teardown order.

#![allow(dead_code)]

use anyhow::{bail, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use url::Url;
use voice_room_client::audio::{AudioBackend, AudioFrame};
use voice_room_client::{
    ConnectionState, SessionConfig, SessionController, SessionError, SessionEvent, Transport,
    TransportEvent,
};

/// 100ms of 16kHz mono audio
pub const SAMPLES_PER_FRAME: usize = 1600;

/// Ordered record of device and transport calls
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    pub fn record(&self, entry: &'static str) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| **e == entry).count()
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MicControl {
    frames: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
}

impl MicControl {
    /// Deliver one frame; false if capture is not running
    pub async fn send_frame(&self, frame: AudioFrame) -> bool {
        let tx = self.frames.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(frame).await.is_ok(),
            None => false,
        }
    }

    /// Simulate the device disappearing mid-session
    pub fn end_capture(&self) {
        self.frames.lock().unwrap().take();
    }
}

#[derive(Clone, Copy, PartialEq)]
enum BackendMode {
    Working,
    Denied,
    /// `start` never completes, like a permission prompt left open
    Hanging,
}

pub struct FakeBackend {
    journal: Journal,
    control: MicControl,
    mode: BackendMode,
    capturing: bool,
}

impl FakeBackend {
    pub fn new(journal: &Journal) -> (Box<dyn AudioBackend>, MicControl) {
        Self::build(journal, BackendMode::Working)
    }

    pub fn denied(journal: &Journal) -> (Box<dyn AudioBackend>, MicControl) {
        Self::build(journal, BackendMode::Denied)
    }

    pub fn hanging(journal: &Journal) -> (Box<dyn AudioBackend>, MicControl) {
        Self::build(journal, BackendMode::Hanging)
    }

    fn build(journal: &Journal, mode: BackendMode) -> (Box<dyn AudioBackend>, MicControl) {
        let control = MicControl::default();
        let backend = FakeBackend {
            journal: journal.clone(),
            control: control.clone(),
            mode,
            capturing: false,
        };
        (Box::new(backend), control)
    }
}

#[async_trait::async_trait]
impl AudioBackend for FakeBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        self.journal.record("backend.start");
        match self.mode {
            BackendMode::Working => {}
            BackendMode::Denied => bail!("microphone permission denied"),
            BackendMode::Hanging => std::future::pending::<()>().await,
        }

        let (tx, rx) = mpsc::channel(100);
        *self.control.frames.lock().unwrap() = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.journal.record("backend.stop");
        self.control.frames.lock().unwrap().take();
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "fake microphone"
    }
}

pub fn frame(amplitude: i16, timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![amplitude; SAMPLES_PER_FRAME],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
    }
}

/// RMS 20 on the 8-bit-centered scale
pub fn loud_frame(timestamp_ms: u64) -> AudioFrame {
    frame(20 * 256, timestamp_ms)
}

/// RMS 0
pub fn quiet_frame(timestamp_ms: u64) -> AudioFrame {
    frame(0, timestamp_ms)
}

/// Push one 500ms chunk worth of frames starting at `start_ms`
pub async fn send_chunk_of(control: &MicControl, loud: bool, start_ms: u64) {
    for i in 0..5 {
        let ts = start_ms + i * 100;
        let f = if loud { loud_frame(ts) } else { quiet_frame(ts) };
        assert!(control.send_frame(f).await, "capture not running");
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RoomControl {
    events: Arc<Mutex<Option<mpsc::Sender<TransportEvent>>>>,
    url: Arc<Mutex<Option<Url>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RoomControl {
    pub async fn push(&self, event: TransportEvent) {
        let tx = self.events.lock().unwrap().clone();
        tx.expect("transport not open")
            .send(event)
            .await
            .expect("session no longer listening");
    }

    pub async fn push_text(&self, text: &str) {
        self.push(TransportEvent::Text(text.to_string())).await;
    }

    pub fn url(&self) -> Option<Url> {
        self.url.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum TransportMode {
    Working,
    Unreachable,
    /// `open` never completes, like a connect to a blackholed host
    HangingOpen,
    /// `send_binary` never completes, like a socket with a full send buffer
    StalledSend,
}

pub struct FakeTransport {
    journal: Journal,
    control: RoomControl,
    mode: TransportMode,
}

impl FakeTransport {
    pub fn new(journal: &Journal) -> (Box<dyn Transport>, RoomControl) {
        Self::build(journal, TransportMode::Working)
    }

    pub fn unreachable(journal: &Journal) -> (Box<dyn Transport>, RoomControl) {
        Self::build(journal, TransportMode::Unreachable)
    }

    pub fn hanging_open(journal: &Journal) -> (Box<dyn Transport>, RoomControl) {
        Self::build(journal, TransportMode::HangingOpen)
    }

    pub fn stalled_send(journal: &Journal) -> (Box<dyn Transport>, RoomControl) {
        Self::build(journal, TransportMode::StalledSend)
    }

    fn build(journal: &Journal, mode: TransportMode) -> (Box<dyn Transport>, RoomControl) {
        let control = RoomControl::default();
        let transport = FakeTransport {
            journal: journal.clone(),
            control: control.clone(),
            mode,
        };
        (Box::new(transport), control)
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn open(&mut self, url: &Url) -> Result<mpsc::Receiver<TransportEvent>, SessionError> {
        self.journal.record("transport.open");
        *self.control.url.lock().unwrap() = Some(url.clone());
        match self.mode {
            TransportMode::Unreachable => {
                return Err(SessionError::TransportOpenFailed("connection refused".to_string()));
            }
            TransportMode::HangingOpen => std::future::pending::<()>().await,
            TransportMode::Working | TransportMode::StalledSend => {}
        }

        let (tx, rx) = mpsc::channel(100);
        *self.control.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), SessionError> {
        self.journal.record("transport.send");
        if self.mode == TransportMode::StalledSend {
            std::future::pending::<()>().await;
        }
        self.control.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.journal.record("transport.close");
        self.control.events.lock().unwrap().take();
        Ok(())
    }

    fn name(&self) -> &str {
        "fake transport"
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn test_config(room: &str) -> SessionConfig {
    let mut config = SessionConfig::new(room, "Swift");
    config.translate_to = "es".to_string();
    config.transcribe_to = "en".to_string();
    config.handshake_timeout = None;
    config
}

pub const HANDSHAKE_OK: &str = r#"{"type":"ws_handshake_status","status":"Connected"}"#;

/// Poll until the controller reports `state`
pub async fn wait_for_state(controller: &SessionController, state: ConnectionState) {
    let mut watch = controller.watch_state();
    tokio::time::timeout(Duration::from_secs(2), watch.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

/// Wait for the first event matching `pred`
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<SessionEvent>, pred: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event stream failed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}
