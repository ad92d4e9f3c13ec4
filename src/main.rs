use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use voice_room_client::audio::AudioBackendConfig;
use voice_room_client::{
    names, AudioBackendFactory, AudioSource, ChunkOutcome, Config, SessionController,
    SessionEvent, WsTransport,
};

/// Join a voice room and stream speech to it
#[derive(Debug, Parser)]
#[command(name = "voice-room", version)]
struct Cli {
    /// Room to join
    #[arg(long)]
    room: String,

    /// Display name (random if omitted)
    #[arg(long)]
    name: Option<String>,

    /// Locale to translate into
    #[arg(long)]
    translate_to: Option<String>,

    /// Locale to transcribe in
    #[arg(long)]
    transcribe_to: Option<String>,

    /// Room server, `host:port` or `ws://host:port`
    #[arg(long)]
    host: Option<String>,

    /// Config file (TOML, extension optional)
    #[arg(long, default_value = "config/voice-room")]
    config: String,

    /// Stream a WAV file instead of the microphone
    #[arg(long)]
    input: Option<PathBuf>,

    /// Talk threshold (RMS, 8-bit-centered scale)
    #[arg(long)]
    threshold: Option<f32>,

    /// Chunk duration in milliseconds
    #[arg(long)]
    chunk_ms: Option<u64>,

    /// Handshake timeout in milliseconds (0 = wait forever)
    #[arg(long)]
    handshake_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    let display_name = cli
        .name
        .clone()
        .or_else(|| cfg.session.display_name.clone())
        .unwrap_or_else(names::random_display_name);

    let mut session_config = cfg.session_config(&cli.room, display_name);
    if let Some(host) = cli.host {
        session_config.host = host;
    }
    if let Some(translate_to) = cli.translate_to {
        session_config.translate_to = translate_to;
    }
    if let Some(transcribe_to) = cli.transcribe_to {
        session_config.transcribe_to = transcribe_to;
    }
    if let Some(threshold) = cli.threshold {
        session_config.talk_threshold = threshold;
    }
    if let Some(chunk_ms) = cli.chunk_ms {
        session_config.chunk_duration = Duration::from_millis(chunk_ms);
    }
    if let Some(timeout_ms) = cli.handshake_timeout_ms {
        session_config.handshake_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
    }

    let source = match cli.input {
        Some(path) => AudioSource::File(path),
        None => AudioSource::Microphone,
    };

    let backend = AudioBackendFactory::create(
        source,
        AudioBackendConfig {
            target_sample_rate: cfg.audio.sample_rate,
            target_channels: cfg.audio.channels,
            frame_duration_ms: cfg.audio.frame_duration_ms,
        },
    )?;

    info!("Voice room client v{}", env!("CARGO_PKG_VERSION"));

    let controller = SessionController::new();
    let mut events = controller.subscribe();

    controller
        .connect(session_config, backend, Box::new(WsTransport::new()))
        .await?;

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, leaving room");
                break Ok(());
            }
            event = events.recv() => match event {
                Ok(SessionEvent::StateChanged(state)) => info!("State: {:?}", state),
                Ok(SessionEvent::TalkStarted) => info!("Talking"),
                Ok(SessionEvent::TalkStopped) => info!("Silent"),
                Ok(SessionEvent::ParticipantCount(count)) => info!("{} in room", count),
                Ok(SessionEvent::Participants(names)) => info!("Participants: {}", names.join(", ")),
                Ok(SessionEvent::Message(text)) => println!("{}", text),
                Ok(SessionEvent::Chunk { index, outcome: ChunkOutcome::Sent }) => {
                    tracing::debug!("Sent chunk {}", index)
                }
                Ok(SessionEvent::Chunk { .. }) => {}
                Ok(SessionEvent::Error(e)) => {
                    error!("{}", e);
                    break Err(e);
                }
                Err(RecvError::Lagged(skipped)) => warn!("Event stream lagged, {} events skipped", skipped),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    let stats = controller.disconnect().await;
    info!(
        "Session over: {} chunks sent ({} bytes), {} dropped, {:.1}s",
        stats.chunks_sent, stats.bytes_sent, stats.chunks_dropped, stats.duration_secs
    );

    outcome.map_err(Into::into)
}
