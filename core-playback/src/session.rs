//! # Playback Session State
//!
//! Read-only views of the shared engine session. The dispatcher owns the
//! engine and publishes a fresh [`SessionSnapshot`] after every command and
//! every engine event; everything else reads snapshots.

use crate::network::BitrateTier;
use bridge_traits::playback::{EngineError, EngineState};
use std::time::Duration;
use uuid::Uuid;

/// Playback state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No source loaded, or stopped.
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
    /// The engine reported an error for the current source.
    Error,
}

impl SessionState {
    /// Whether a source has been prepared and the engine can play it
    /// without constructing a new one.
    pub fn is_prepared(&self) -> bool {
        matches!(
            self,
            SessionState::Buffering | SessionState::Ready | SessionState::Ended
        )
    }
}

impl From<EngineState> for SessionState {
    fn from(state: EngineState) -> Self {
        match state {
            EngineState::Idle => SessionState::Idle,
            EngineState::Buffering => SessionState::Buffering,
            EngineState::Ready => SessionState::Ready,
            EngineState::Ended => SessionState::Ended,
        }
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Identifier of the engine instance, `None` once released.
    pub session_id: Option<Uuid>,
    /// URL of the current queue item.
    pub url: Option<String>,
    pub state: SessionState,
    pub play_when_ready: bool,
    /// Output volume before muting.
    pub volume: f32,
    pub muted: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub current_index: Option<usize>,
    /// URLs in engine queue order.
    pub queue: Vec<String>,
    /// Source generation; bumped on every source change.
    pub generation: u64,
    /// Last engine error for the current source.
    pub error: Option<EngineError>,
    /// Bitrate tier currently applied to track selection.
    pub tier: Option<BitrateTier>,
}

impl SessionSnapshot {
    /// Playback progress in `[0, 1]`; `0.0` when the duration is unknown.
    pub fn progress(&self) -> f32 {
        match self.duration {
            Some(duration) if !duration.is_zero() => {
                (self.position.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0) as f32
            }
            _ => 0.0,
        }
    }

    /// Queue index of `url`, if queued.
    pub fn queue_index(&self, url: &str) -> Option<usize> {
        self.queue.iter().position(|queued| queued == url)
    }

    /// Whether `url` is the current item and already prepared.
    pub fn is_current_and_prepared(&self, url: &str) -> bool {
        self.url.as_deref() == Some(url) && self.state.is_prepared()
    }
}

/// Manager-level lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerState {
    /// No engine and no cache handle.
    #[default]
    Uninitialized,
    /// Engine created and playback allowed.
    Ready,
    /// Paused by the caller or the host lifecycle.
    Paused,
    /// Paused because connectivity was lost.
    Stalled,
}
