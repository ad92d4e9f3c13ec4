pub mod audio;
pub mod config;
pub mod error;
pub mod names;
pub mod session;
pub mod ws;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource,
    ChunkConfig, ChunkEncoder, EncodedChunk, EnergyDetector, FileBackend, TalkingState,
    TalkingStateTracker,
};
pub use config::Config;
pub use error::SessionError;
pub use session::{ChunkOutcome, SessionConfig, SessionController, SessionEvent, SessionStats};
pub use ws::{ConnectionManager, ConnectionState, InboundMessage, Transport, TransportEvent, WsTransport};
