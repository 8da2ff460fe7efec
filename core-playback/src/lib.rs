//! # Reel Playback Core
//!
//! Adaptive media playback manager for a short-form vertical video feed.
//!
//! ## Overview
//!
//! This crate handles:
//! - One shared media engine session, driven from a single dispatcher task
//! - A bounded on-disk LRU cache in front of every media fetch
//! - Bitrate ceilings chosen from the network type (WiFi, cellular, unknown)
//! - Bounded retry with exponential backoff and a minimal-bitrate final retry
//! - Preloading the next clip when throughput allows
//! - Pause, resume, stall/recover and release tied to the host lifecycle
//!
//! Decoding and rendering stay in the host's engine; see
//! [`bridge_traits::playback`].

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod manager;
pub mod network;
pub mod preload;
pub mod retry;
pub mod selection;
pub mod session;
pub mod source;

pub use cache::{CacheConfig, CacheDataSource, CacheDataSourceFactory, CacheStats, CacheStore};
pub use config::{BitrateConfig, BufferConfig, PlaybackConfig, PreloadConfig, RetryConfig};
pub use dispatcher::{DispatcherHandle, EngineCommand};
pub use error::{ErrorClass, PlaybackError, Result};
pub use manager::{PlayOutcome, PlaybackManager};
pub use network::{BandwidthMeter, BitrateTier, NetworkProfile};
pub use preload::PreloadOutcome;
pub use retry::{RetryPolicy, RetryState};
pub use session::{ManagerState, SessionSnapshot, SessionState};
