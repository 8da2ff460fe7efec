//! # Playback Configuration
//!
//! Tunables for buffering, bitrate ceilings, retry, preloading and caching.
//!
//! Every field has a serde default, so hosts can ship a partial JSON document
//! and only override what they need:
//!
//! ```rust
//! use core_playback::config::PlaybackConfig;
//!
//! let config = PlaybackConfig::from_json_str(r#"{ "retry": { "max_retries": 5 } }"#).unwrap();
//! assert_eq!(config.retry.max_retries, 5);
//! assert_eq!(config.preload.max_items, 1);
//! ```

use crate::cache::CacheConfig;
use crate::error::{PlaybackError, Result};
use crate::network::BitrateTier;
use bridge_traits::{LoadControl, TrackSelection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level playback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Engine buffering targets.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Maximum video bitrate per network tier.
    #[serde(default)]
    pub bitrate: BitrateConfig,

    /// Retry bound and backoff schedule.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Upcoming-item preloading.
    #[serde(default)]
    pub preload: PreloadConfig,

    /// Disk cache layout.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Longest wait for the engine to become ready after preparing a source.
    ///
    /// Default: 15 seconds.
    #[serde(default = "default_prepare_timeout_ms")]
    pub prepare_timeout_ms: u64,

    /// Loop the current clip when it ends.
    ///
    /// Default: true (reels loop until the user swipes).
    #[serde(default = "default_repeat_one")]
    pub repeat_one: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            bitrate: BitrateConfig::default(),
            retry: RetryConfig::default(),
            preload: PreloadConfig::default(),
            cache: CacheConfig::default(),
            prepare_timeout_ms: default_prepare_timeout_ms(),
            repeat_one: default_repeat_one(),
        }
    }
}

impl PlaybackConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PlaybackError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_bitrate(mut self, bitrate: BitrateConfig) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_preload(mut self, preload: PreloadConfig) -> Self {
        self.preload = preload;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_prepare_timeout(mut self, timeout: Duration) -> Self {
        self.prepare_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_repeat_one(mut self, repeat_one: bool) -> Self {
        self.repeat_one = repeat_one;
        self
    }

    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.prepare_timeout_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| Err(PlaybackError::InvalidConfig(message.to_string()));

        if self.buffer.min_buffer_ms == 0 {
            return invalid("buffer.min_buffer_ms must be > 0");
        }
        if self.buffer.min_buffer_ms > self.buffer.max_buffer_ms {
            return invalid("buffer.min_buffer_ms cannot exceed buffer.max_buffer_ms");
        }
        if self.buffer.buffer_for_playback_ms > self.buffer.min_buffer_ms
            || self.buffer.buffer_after_rebuffer_ms > self.buffer.min_buffer_ms
        {
            return invalid("playback start thresholds cannot exceed buffer.min_buffer_ms");
        }

        if self.bitrate.minimal_bps == 0 {
            return invalid("bitrate.minimal_bps must be > 0");
        }
        if self.bitrate.minimal_bps > self.bitrate.cellular_bps
            || self.bitrate.cellular_bps > self.bitrate.wifi_bps
        {
            return invalid("bitrate ceilings must satisfy minimal <= cellular <= wifi");
        }

        if self.retry.initial_backoff_ms == 0 {
            return invalid("retry.initial_backoff_ms must be > 0");
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return invalid("retry.initial_backoff_ms cannot exceed retry.max_backoff_ms");
        }

        if self.prepare_timeout_ms == 0 {
            return invalid("prepare_timeout_ms must be > 0");
        }

        self.cache
            .validate()
            .map_err(PlaybackError::InvalidConfig)?;

        Ok(())
    }
}

/// Engine buffering targets, tuned for short clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Default: 5 seconds.
    #[serde(default = "default_min_buffer_ms")]
    pub min_buffer_ms: u64,

    /// Default: 20 seconds.
    #[serde(default = "default_max_buffer_ms")]
    pub max_buffer_ms: u64,

    /// Media required before playback starts. Default: 1 second.
    #[serde(default = "default_buffer_for_playback_ms")]
    pub buffer_for_playback_ms: u64,

    /// Media required before playback restarts after a rebuffer. Default: 2 seconds.
    #[serde(default = "default_buffer_after_rebuffer_ms")]
    pub buffer_after_rebuffer_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            min_buffer_ms: default_min_buffer_ms(),
            max_buffer_ms: default_max_buffer_ms(),
            buffer_for_playback_ms: default_buffer_for_playback_ms(),
            buffer_after_rebuffer_ms: default_buffer_after_rebuffer_ms(),
        }
    }
}

impl BufferConfig {
    /// Engine-facing load control.
    pub fn load_control(&self) -> LoadControl {
        LoadControl {
            min_buffer: Duration::from_millis(self.min_buffer_ms),
            max_buffer: Duration::from_millis(self.max_buffer_ms),
            buffer_for_playback: Duration::from_millis(self.buffer_for_playback_ms),
            buffer_for_playback_after_rebuffer: Duration::from_millis(
                self.buffer_after_rebuffer_ms,
            ),
        }
    }
}

/// Maximum video bitrate for each tier, in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateConfig {
    /// Default: 4 Mbps.
    #[serde(default = "default_wifi_bps")]
    pub wifi_bps: u64,

    /// Default: 1.2 Mbps.
    #[serde(default = "default_cellular_bps")]
    pub cellular_bps: u64,

    /// Unknown network and final retry. Default: 500 kbps.
    #[serde(default = "default_minimal_bps")]
    pub minimal_bps: u64,
}

impl Default for BitrateConfig {
    fn default() -> Self {
        Self {
            wifi_bps: default_wifi_bps(),
            cellular_bps: default_cellular_bps(),
            minimal_bps: default_minimal_bps(),
        }
    }
}

impl BitrateConfig {
    /// Ceiling for a tier.
    pub fn ceiling(&self, tier: BitrateTier) -> u64 {
        match tier {
            BitrateTier::High => self.wifi_bps,
            BitrateTier::Low => self.cellular_bps,
            BitrateTier::Minimal => self.minimal_bps,
        }
    }

    /// Track selection constraints for a tier.
    pub fn track_selection(&self, tier: BitrateTier) -> TrackSelection {
        TrackSelection {
            max_video_bitrate_bps: self.ceiling(tier),
        }
    }
}

/// Retry bound and exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt. Default: 3.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry. Default: 1 second.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap. Default: 4 seconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Drop to the minimal bitrate tier for the final retry. Default: true.
    #[serde(default = "default_minimal_on_final_retry")]
    pub minimal_on_final_retry: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            minimal_on_final_retry: default_minimal_on_final_retry(),
        }
    }
}

/// Upcoming-item preloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Upcoming items kept in the engine queue. Default: 1.
    #[serde(default = "default_max_preload_items")]
    pub max_items: usize,

    /// Throughput floor below which nothing is preloaded. Default: 150 kbps.
    #[serde(default = "default_min_throughput_kbps")]
    pub min_throughput_kbps: u32,

    /// Already-played items kept behind the current one. Default: 1.
    #[serde(default = "default_window_behind")]
    pub window_behind: usize,

    /// Fetch preloaded URLs into the disk cache. Default: true.
    #[serde(default = "default_warm_cache")]
    pub warm_cache: bool,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_preload_items(),
            min_throughput_kbps: default_min_throughput_kbps(),
            window_behind: default_window_behind(),
            warm_cache: default_warm_cache(),
        }
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_prepare_timeout_ms() -> u64 {
    15_000
}

fn default_repeat_one() -> bool {
    true
}

fn default_min_buffer_ms() -> u64 {
    5_000
}

fn default_max_buffer_ms() -> u64 {
    20_000
}

fn default_buffer_for_playback_ms() -> u64 {
    1_000
}

fn default_buffer_after_rebuffer_ms() -> u64 {
    2_000
}

fn default_wifi_bps() -> u64 {
    4_000_000
}

fn default_cellular_bps() -> u64 {
    1_200_000
}

fn default_minimal_bps() -> u64 {
    500_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    4_000
}

fn default_minimal_on_final_retry() -> bool {
    true
}

fn default_max_preload_items() -> usize {
    1
}

fn default_min_throughput_kbps() -> u32 {
    150
}

fn default_window_behind() -> usize {
    1
}

fn default_warm_cache() -> bool {
    true
}
