//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Layout and network settings for the media disk cache.
///
/// The byte ceiling itself comes from `CoreConfig::cache_size_mb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory created under the cache root (default: "reel_media_cache")
    #[serde(default = "default_cache_directory")]
    pub cache_directory: String,

    /// Timeout for a single network fetch on cache miss (default: 30s)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: default_cache_directory(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cache directory name.
    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Set per-fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_directory.is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        if self.cache_directory.contains(['/', '\\']) || self.cache_directory == ".." {
            return Err("cache_directory must be a single path component".to_string());
        }

        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

fn default_cache_directory() -> String {
    "reel_media_cache".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}
