//! Room session management
//!
//! This module provides the `SessionController` that manages:
//! - Microphone acquisition and release
//! - Speech gating and chunked transmission
//! - The room connection lifecycle
//! - Event delivery to the presentation layer

mod config;
mod controller;
mod events;
mod stats;

pub use config::SessionConfig;
pub use controller::SessionController;
pub use events::{ChunkOutcome, EventBus, SessionEvent};
pub use stats::{SessionCounters, SessionStats};
