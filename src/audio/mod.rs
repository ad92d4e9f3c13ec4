pub mod backend;
pub mod chunk;
pub mod energy;
pub mod file;
pub mod frames;
#[cfg(feature = "microphone")]
pub mod microphone;
pub mod talking;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use chunk::{ChunkConfig, ChunkEncoder, EncodedChunk};
pub use energy::{AnalysisWindow, EnergyDetector};
pub use file::{AudioFile, FileBackend};
pub use frames::FrameAssembler;
#[cfg(feature = "microphone")]
pub use microphone::MicrophoneBackend;
pub use talking::{TalkTransition, TalkingState, TalkingStateTracker};
