use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default talk threshold on the 8-bit-centered RMS scale
pub const DEFAULT_TALK_THRESHOLD: f32 = 10.0;

/// Speech-activity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TalkingState {
    #[default]
    Idle,
    Talking,
}

/// Edge emitted when the classification changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TalkTransition {
    Started,
    Stopped,
}

/// Two-state speech tracker driven by RMS readings
///
/// Enters `Talking` on `rms > threshold` and leaves it on `rms <= threshold`,
/// so a reading exactly at the threshold never produces a start/stop pair.
#[derive(Debug, Clone)]
pub struct TalkingStateTracker {
    threshold: f32,
    state: TalkingState,
}

impl TalkingStateTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: TalkingState::Idle,
        }
    }

    pub fn state(&self) -> TalkingState {
        self.state
    }

    /// Feed one reading; returns the transition if the state changed
    pub fn observe(&mut self, rms: f32) -> Option<TalkTransition> {
        let transition = match self.state {
            TalkingState::Idle if rms > self.threshold => {
                self.state = TalkingState::Talking;
                Some(TalkTransition::Started)
            }
            TalkingState::Talking if rms <= self.threshold => {
                self.state = TalkingState::Idle;
                Some(TalkTransition::Stopped)
            }
            _ => None,
        };

        match transition {
            Some(TalkTransition::Started) => info!("Talk start (rms={:.1})", rms),
            Some(TalkTransition::Stopped) => info!("Talk stop (rms={:.1})", rms),
            None => debug!("Talk state unchanged: {:?} (rms={:.1})", self.state, rms),
        }

        transition
    }

    pub fn reset(&mut self) {
        self.state = TalkingState::Idle;
    }
}

impl Default for TalkingStateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TALK_THRESHOLD)
    }
}
