use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::events::{ChunkOutcome, EventBus, SessionEvent};
use super::stats::{SessionCounters, SessionStats};
use crate::audio::{
    AnalysisWindow, AudioBackend, AudioFrame, ChunkConfig, ChunkEncoder, EncodedChunk,
    TalkTransition, TalkingState, TalkingStateTracker,
};
use crate::error::{SessionError, SessionResult};
use crate::ws::{ConnectionManager, ConnectionState, Transport, TransportEvent};

/// Top-level orchestrator: one room session at a time
///
/// `connect` acquires the microphone, opens the room connection, and hands
/// both to a session task that owns them until teardown. All session state is
/// mutated on that one task; the controller only signals it and observes the
/// event bus.
pub struct SessionController {
    bus: EventBus,
    counters: Arc<SessionCounters>,
    active: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    room: String,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            bus: EventBus::new(),
            counters: Arc::new(SessionCounters::default()),
            active: Mutex::new(None),
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Observe the connection state
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.bus.watch_state()
    }

    pub fn state(&self) -> ConnectionState {
        self.bus.state()
    }

    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot(self.state())
    }

    /// Start a session.
    ///
    /// Fails with `AlreadyConnected` while another session is underway,
    /// `InvalidConfig` for an empty room, `DeviceUnavailable` if the backend
    /// cannot start, and `TransportOpenFailed` if the room is unreachable (the
    /// microphone is released again in that case). A `disconnect` issued before
    /// the transport opens cancels the attempt with `ConnectCancelled`.
    /// Returns once the transport is open; the session is then
    /// `AwaitingHandshake`.
    pub async fn connect(
        &self,
        config: SessionConfig,
        backend: Box<dyn AudioBackend>,
        transport: Box<dyn Transport>,
    ) -> SessionResult<()> {
        if !self.state().is_disconnected() {
            warn!("Connect rejected: session already {:?}", self.state());
            return Err(SessionError::AlreadyConnected);
        }

        config.validate()?;

        let ready_rx = {
            let mut active = self.active.lock().await;

            if !self.bus.try_begin_connect() {
                warn!("Connect rejected: lost race to another connect");
                return Err(SessionError::AlreadyConnected);
            }

            // A session that ended on its own leaves a finished task behind
            if let Some(previous) = active.take() {
                debug!("Reaping previous session for room '{}'", previous.room);
                if let Err(e) = previous.task.await {
                    error!("Previous session task panicked: {}", e);
                }
            }

            info!(
                "Connecting to room '{}' as '{}' (translate_to={}, transcribe_to={})",
                config.room, config.display_name, config.translate_to, config.transcribe_to
            );

            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let (ready_tx, ready_rx) = oneshot::channel();
            let room = config.room.clone();

            let startup = SessionStartup {
                config,
                backend,
                transport,
                bus: self.bus.clone(),
                counters: Arc::clone(&self.counters),
            };
            let task = tokio::spawn(startup.run(shutdown_rx, ready_tx));

            // Registered before setup runs so `disconnect` can cancel it
            *active = Some(ActiveSession {
                room,
                shutdown_tx,
                task,
            });

            ready_rx
        };

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => {
                error!("Session task ended before reporting startup");
                Err(SessionError::ConnectCancelled)
            }
        }
    }

    /// Tear down the current session. A no-op when already disconnected.
    ///
    /// Works in every state: an in-progress connect or chunk transmission is
    /// abandoned. Capture is stopped and the microphone released before the
    /// transport is closed; the state is `Disconnected` when this returns.
    pub async fn disconnect(&self) -> SessionStats {
        let mut active = self.active.lock().await;

        match active.take() {
            Some(session) => {
                info!("Disconnecting from room '{}'", session.room);

                // The task may already have ended on its own
                let _ = session.shutdown_tx.send(());

                if let Err(e) = session.task.await {
                    error!("Session task panicked: {}", e);
                }

                self.bus.set_state(ConnectionState::Disconnected);
            }
            None => debug!("Disconnect requested with no active session"),
        }

        self.stats()
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Device acquisition and transport open, run on the session task
struct SessionStartup {
    config: SessionConfig,
    backend: Box<dyn AudioBackend>,
    transport: Box<dyn Transport>,
    bus: EventBus,
    counters: Arc<SessionCounters>,
}

impl SessionStartup {
    async fn run(
        self,
        mut shutdown_rx: oneshot::Receiver<()>,
        ready: oneshot::Sender<SessionResult<()>>,
    ) {
        let SessionStartup {
            config,
            mut backend,
            transport,
            bus,
            counters,
        } = self;

        let started = tokio::select! {
            biased;
            _ = &mut shutdown_rx => None,
            started = backend.start() => Some(started),
        };

        let frames = match started {
            Some(Ok(frames)) => frames,
            Some(Err(e)) => {
                error!("Failed to acquire {}: {:#}", backend.name(), e);
                bus.set_state(ConnectionState::Disconnected);
                let _ = ready.send(Err(SessionError::DeviceUnavailable(format!("{:#}", e))));
                return;
            }
            None => {
                info!("Connect cancelled while acquiring {}", backend.name());
                release_device(backend.as_mut()).await;
                bus.set_state(ConnectionState::Disconnected);
                let _ = ready.send(Err(SessionError::ConnectCancelled));
                return;
            }
        };

        info!("Audio capture started: {}", backend.name());

        let mut connection = ConnectionManager::new(transport, bus.clone());
        let opened = tokio::select! {
            biased;
            _ = &mut shutdown_rx => None,
            opened = connection.open(&config) => Some(opened),
        };

        let transport_events = match opened {
            Some(Ok(events)) => events,
            Some(Err(e)) => {
                release_device(backend.as_mut()).await;
                let _ = ready.send(Err(e));
                return;
            }
            None => {
                info!("Connect to room '{}' cancelled before transport open", config.room);
                release_device(backend.as_mut()).await;
                if let Err(e) = connection.close().await {
                    debug!("Closing half-open transport failed: {}", e);
                }
                let _ = ready.send(Err(SessionError::ConnectCancelled));
                return;
            }
        };

        counters.reset();

        let task = SessionTask {
            capture: AudioCapture::new(&config, backend, frames),
            config,
            connection,
            bus,
            counters,
            shutdown_rx,
        };

        if ready.send(Ok(())).is_err() {
            debug!("Connect caller went away, session continues until disconnect");
        }

        task.run(transport_events).await;
    }
}

async fn release_device(backend: &mut dyn AudioBackend) {
    if let Err(e) = backend.stop().await {
        warn!("Failed to release {}: {:#}", backend.name(), e);
    }
}

/// Microphone stream plus the detection and chunking pipeline fed by it
struct AudioCapture {
    backend: Box<dyn AudioBackend>,
    frames: mpsc::Receiver<AudioFrame>,
    window: AnalysisWindow,
    tracker: TalkingStateTracker,
    encoder: ChunkEncoder,
}

impl AudioCapture {
    fn new(
        config: &SessionConfig,
        backend: Box<dyn AudioBackend>,
        frames: mpsc::Receiver<AudioFrame>,
    ) -> Self {
        Self {
            backend,
            frames,
            window: AnalysisWindow::new(config.analysis_window),
            tracker: TalkingStateTracker::new(config.talk_threshold),
            encoder: ChunkEncoder::new(ChunkConfig {
                chunk_duration: config.chunk_duration,
            }),
        }
    }
}

/// Why the session loop stopped
enum Exit {
    Shutdown,
    Failed(SessionError),
}

impl From<SessionError> for Exit {
    fn from(err: SessionError) -> Self {
        Exit::Failed(err)
    }
}

/// Owns everything belonging to one live session
struct SessionTask {
    config: SessionConfig,
    connection: ConnectionManager,
    capture: AudioCapture,
    bus: EventBus,
    counters: Arc<SessionCounters>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl SessionTask {
    async fn run(mut self, mut transport_events: mpsc::Receiver<TransportEvent>) {
        info!("Session task started for room '{}'", self.config.room);

        let handshake_deadline = self.config.handshake_timeout.map(|t| Instant::now() + t);

        let failure = loop {
            let awaiting_handshake = self.connection.state() == ConnectionState::AwaitingHandshake;

            tokio::select! {
                biased;

                // Sender dropped counts as a disconnect too
                _ = &mut self.shutdown_rx => break None,

                _ = sleep_until(handshake_deadline), if awaiting_handshake => {
                    let timeout_ms = self
                        .config
                        .handshake_timeout
                        .map(|t| t.as_millis() as u64)
                        .unwrap_or_default();
                    warn!("No handshake from room '{}' after {}ms", self.config.room, timeout_ms);
                    break Some(SessionError::HandshakeTimeout { timeout_ms });
                }

                event = transport_events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.connection.handle_event(event) {
                            break Some(e);
                        }
                        if let Some(count) = self.connection.participant_count() {
                            self.counters.set_participant_count(count);
                        }
                    }
                    None => break Some(SessionError::TransportClosed("event stream ended".to_string())),
                },

                frame = self.capture.frames.recv() => match frame {
                    Some(frame) => match self.on_frame(frame).await {
                        Ok(()) => {}
                        Err(Exit::Shutdown) => break None,
                        Err(Exit::Failed(e)) => break Some(e),
                    },
                    None => break Some(SessionError::DeviceUnavailable("capture stream ended".to_string())),
                },
            }
        };

        self.teardown(failure).await;
    }

    async fn on_frame(&mut self, frame: AudioFrame) -> Result<(), Exit> {
        self.capture.window.push(&frame.samples);

        let chunks = self.capture.encoder.push(&frame).map_err(|e| {
            SessionError::DeviceUnavailable(format!("chunk encoding failed: {:#}", e))
        })?;

        for chunk in chunks {
            self.gate_chunk(chunk).await?;
        }

        Ok(())
    }

    /// Transmit-or-drop decision for one finished chunk, from a fresh reading
    ///
    /// A transmission in flight is abandoned when shutdown is requested.
    async fn gate_chunk(&mut self, chunk: EncodedChunk) -> Result<(), Exit> {
        let index = chunk.chunk_index;
        let size = chunk.payload.len();

        let outcome = match self.capture.window.measure() {
            None => ChunkOutcome::NoReading,
            Some(rms) => {
                if let Some(transition) = self.capture.tracker.observe(rms) {
                    self.announce_talk(transition);
                }

                if self.capture.tracker.state() != TalkingState::Talking {
                    ChunkOutcome::DroppedSilent
                } else if !self.connection.is_active() {
                    ChunkOutcome::DroppedNotActive
                } else {
                    let sent = tokio::select! {
                        biased;
                        _ = &mut self.shutdown_rx => None,
                        sent = self.connection.send_chunk(chunk.payload) => Some(sent),
                    };
                    match sent {
                        Some(result) => {
                            result?;
                            ChunkOutcome::Sent
                        }
                        None => {
                            debug!("Chunk {} abandoned mid-send by disconnect", index);
                            return Err(Exit::Shutdown);
                        }
                    }
                }
            }
        };

        match outcome {
            ChunkOutcome::Sent => debug!("Chunk {} sent ({} bytes)", index, size),
            other => debug!("Chunk {} dropped: {:?}", index, other),
        }

        self.counters.record_chunk(outcome, size);
        self.bus.emit(SessionEvent::Chunk { index, outcome });

        Ok(())
    }

    fn announce_talk(&self, transition: TalkTransition) {
        match transition {
            TalkTransition::Started => {
                self.counters.set_talking(true);
                self.bus.emit(SessionEvent::TalkStarted);
            }
            TalkTransition::Stopped => {
                self.counters.set_talking(false);
                self.bus.emit(SessionEvent::TalkStopped);
            }
        }
    }

    /// Stop capture, release the device, close the transport, then report
    async fn teardown(mut self, failure: Option<SessionError>) {
        info!("Tearing down session for room '{}'", self.config.room);

        self.capture.encoder.discard();
        if self.capture.tracker.state() == TalkingState::Talking {
            self.capture.tracker.reset();
            self.announce_talk(TalkTransition::Stopped);
        }

        self.capture.frames.close();
        if let Err(e) = self.capture.backend.stop().await {
            error!("Failed to release {}: {:#}", self.capture.backend.name(), e);
        }

        if let Err(e) = self.connection.close().await {
            warn!("Transport close failed during teardown: {}", e);
        }

        if let Some(err) = failure {
            error!("Session ended: {}", err);
            self.bus.emit(SessionEvent::Error(err));
        }

        info!("Session for room '{}' disconnected", self.config.room);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
