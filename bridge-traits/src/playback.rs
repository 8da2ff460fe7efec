//! Media engine bridge traits and supporting types.
//!
//! The core never decodes or renders video itself. Hosts plug in a native
//! engine (ExoPlayer on Android, AVPlayer on iOS, GStreamer/ffmpeg on
//! desktop) through [`MediaEngineFactory`] and [`MediaEngine`]. Byte access
//! goes back through the core's [`DataSource`] so every read is served from,
//! or written into, the shared disk cache.
//!
//! Engines are not expected to be thread-safe: the core owns the engine from
//! a single dispatcher task and never calls it concurrently. Engines report
//! asynchronous state changes through the [`EngineEventSender`] handed to
//! them at construction.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Container/protocol family of a media URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// Single-file progressive download (MP4, WebM, ...)
    Progressive,
    /// HTTP Live Streaming playlist (`.m3u8`)
    Hls,
    /// MPEG-DASH manifest (`.mpd`)
    Dash,
}

impl SourceType {
    /// Returns `true` for manifest-driven adaptive formats.
    pub fn is_adaptive(&self) -> bool {
        matches!(self, SourceType::Hls | SourceType::Dash)
    }
}

/// Resolves a URL into bytes for the engine.
///
/// The core's implementation consults the disk cache first and falls back to
/// the network.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch the full resource at `url` (progressive file, playlist or segment).
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// A playable item handed to the engine.
#[derive(Clone)]
pub struct MediaSource {
    /// Media identifier; also the cache key of the root resource.
    pub url: String,
    /// Format family the engine should use to parse the resource.
    pub source_type: SourceType,
    /// Byte provider for the root resource and any segment it references.
    pub data_source: Arc<dyn DataSource>,
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("url", &self.url)
            .field("source_type", &self.source_type)
            .finish_non_exhaustive()
    }
}

/// Buffering targets applied when the engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadControl {
    /// Buffer the engine tries to keep at minimum.
    pub min_buffer: Duration,
    /// Buffer the engine never exceeds.
    pub max_buffer: Duration,
    /// Media needed before playback starts.
    pub buffer_for_playback: Duration,
    /// Media needed before playback restarts after a rebuffer.
    pub buffer_for_playback_after_rebuffer: Duration,
}

/// Track-selection constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSelection {
    /// Highest video bitrate the selector may pick, in bits per second.
    pub max_video_bitrate_bps: u64,
}

/// Everything the factory needs to build an engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub load_control: LoadControl,
    pub track_selection: TrackSelection,
    /// Loop the current item when it ends.
    pub repeat_one: bool,
    /// Initial output volume in `0.0..=1.0`.
    pub volume: f32,
}

/// Engine playback state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No source or stopped.
    Idle,
    /// Waiting for enough media to start or continue.
    Buffering,
    /// Able to play immediately.
    Ready,
    /// Reached the end of the last item.
    Ended,
}

/// Failure category reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// Connection dropped, DNS failure, reset.
    Network,
    /// Read or connect timeout.
    Timeout,
    /// Server answered with a non-success status.
    HttpStatus(u16),
    /// Resource does not exist (local file missing, 404/410).
    NotFound,
    /// Network or storage permission missing.
    PermissionDenied,
    /// Container or codec could not be decoded.
    Decode,
    /// Anything the engine cannot categorize.
    Unknown,
}

/// Error surfaced asynchronously by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub code: EngineErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: EngineErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Asynchronous notification from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Playback state changed.
    StateChanged(EngineState),
    /// The engine moved to another queue item (auto-advance or seek).
    ItemTransition { index: usize },
    /// Playback failed.
    Error(EngineError),
}

/// An [`EngineEvent`] tagged with the source generation it was emitted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedEvent {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Sending half of the engine event channel.
///
/// Every event is stamped with the source generation current at send time, so
/// the consumer can drop events that belong to a replaced source.
#[derive(Clone, Debug)]
pub struct EngineEventSender {
    tx: mpsc::UnboundedSender<StampedEvent>,
    generation: Arc<AtomicU64>,
}

impl EngineEventSender {
    /// Create a connected sender/receiver pair starting at generation 0.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StampedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                generation: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Emit an event. Returns `false` once the receiver is gone.
    pub fn send(&self, event: EngineEvent) -> bool {
        let generation = self.generation.load(Ordering::SeqCst);
        self.tx.send(StampedEvent { generation, event }).is_ok()
    }

    /// Current source generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new source generation and return it.
    ///
    /// Called by the core right before it replaces the engine's source.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Native media engine driven by the core.
///
/// Queue indices are zero-based. `set_source` replaces the whole queue with a
/// single item.
pub trait MediaEngine: Send {
    /// Replace the queue with `source` and reset to its start.
    fn set_source(&mut self, source: MediaSource) -> Result<()>;

    /// Append `source` to the end of the queue.
    fn add_source(&mut self, source: MediaSource) -> Result<()>;

    /// Remove the queue item at `index`.
    fn remove_item(&mut self, index: usize) -> Result<()>;

    /// Remove every queue item.
    fn clear_items(&mut self) -> Result<()>;

    /// Jump to the start of the queue item at `index`.
    fn seek_to_item(&mut self, index: usize) -> Result<()>;

    /// Index of the item being played, if any.
    fn current_item_index(&self) -> Option<usize>;

    /// Number of items in the queue.
    fn item_count(&self) -> usize;

    /// Start loading the current item.
    fn prepare(&mut self) -> Result<()>;

    /// Play as soon as ready (`true`) or hold (`false`).
    fn set_play_when_ready(&mut self, play_when_ready: bool) -> Result<()>;

    /// Stop playback and drop buffered media; the queue is kept.
    fn stop(&mut self) -> Result<()>;

    /// Apply new track-selection constraints.
    fn set_track_selection(&mut self, selection: TrackSelection) -> Result<()>;

    /// Set output volume in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    /// Position within the current item.
    fn position(&self) -> Duration;

    /// Duration of the current item, when known.
    fn duration(&self) -> Option<Duration>;

    /// Free native resources. The engine is unusable afterwards.
    fn release(&mut self);
}

/// Builds engine instances.
pub trait MediaEngineFactory: Send + Sync {
    fn create(
        &self,
        config: EngineConfig,
        events: EngineEventSender,
    ) -> Result<Box<dyn MediaEngine>>;
}
