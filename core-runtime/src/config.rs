//! # Core Configuration
//!
//! [`CoreConfig`] gathers the host bridges and disk cache settings the
//! playback manager is built from. [`CoreConfigBuilder::build`] fails fast:
//! a missing bridge is reported when the host wires the core, not on the
//! first `play()`.
//!
//! | Bridge | Required | Default |
//! |--------|----------|---------|
//! | `MediaEngineFactory` | yes | none |
//! | `HttpClient` | yes | `ReqwestHttpClient` with `desktop-shims` |
//! | `FileSystemAccess` | yes | `TokioFileSystem` with `desktop-shims` |
//! | `NetworkMonitor` | yes | `DesktopNetworkMonitor` with `desktop-shims` |
//! | `Sleeper` | no | `TokioSleeper` |
//! | `LifecycleObserver` | no | none |
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .cache_dir(context.cache_dir())
//!     .cache_size_mb(256)
//!     .engine_factory(Arc::new(ExoPlayerFactory::new(env)))
//!     .http_client(Arc::new(OkHttpBridge::new(env)))
//!     .file_system(Arc::new(AppStorage::new(env)))
//!     .network_monitor(Arc::new(ConnectivityBridge::new(env)))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    FileSystemAccess, HttpClient, LifecycleObserver, MediaEngineFactory, NetworkMonitor, Sleeper,
    TokioSleeper,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Disk budget when the host sets none.
pub const DEFAULT_CACHE_SIZE_MB: usize = 512;

/// Upper bound on the disk budget (100 GB).
pub const MAX_CACHE_SIZE_MB: usize = 100_000;

/// Bridges and cache settings for one playback manager.
#[derive(Clone)]
pub struct CoreConfig {
    /// Parent of the media cache directory.
    pub cache_dir: PathBuf,
    pub cache_size_mb: usize,
    pub engine_factory: Arc<dyn MediaEngineFactory>,
    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub network_monitor: Arc<dyn NetworkMonitor>,
    /// Backoff timer between playback retries.
    pub sleeper: Arc<dyn Sleeper>,
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("cache_size_mb", &self.cache_size_mb)
            .field("lifecycle_observer", &self.lifecycle_observer.is_some())
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn cache_size_bytes(&self) -> u64 {
        self.cache_size_mb as u64 * 1024 * 1024
    }

    /// Reject an empty cache path and budgets outside `1..=MAX_CACHE_SIZE_MB`.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("cache_dir must not be empty".to_string()));
        }

        if !(1..=MAX_CACHE_SIZE_MB).contains(&self.cache_size_mb) {
            return Err(Error::Config(format!(
                "cache_size_mb must be between 1 and {}, got {}",
                MAX_CACHE_SIZE_MB, self.cache_size_mb
            )));
        }

        Ok(())
    }
}

fn missing(capability: &str, hint: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: hint.to_string(),
    }
}

/// Fallbacks for bridges the host left unset.
#[cfg(feature = "desktop-shims")]
mod defaults {
    use super::*;
    use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient, TokioFileSystem};

    pub(super) fn cache_dir() -> Result<PathBuf> {
        Ok(bridge_desktop::default_cache_root())
    }

    pub(super) fn http_client() -> Result<Arc<dyn HttpClient>> {
        Ok(Arc::new(ReqwestHttpClient::new()))
    }

    pub(super) fn file_system() -> Result<Arc<dyn FileSystemAccess>> {
        Ok(Arc::new(TokioFileSystem::new()))
    }

    pub(super) fn network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
        Ok(Arc::new(DesktopNetworkMonitor::new()))
    }
}

#[cfg(not(feature = "desktop-shims"))]
mod defaults {
    use super::*;

    pub(super) fn cache_dir() -> Result<PathBuf> {
        Err(Error::Config(
            "cache_dir is required; pass the app's cache directory to .cache_dir()".to_string(),
        ))
    }

    pub(super) fn http_client() -> Result<Arc<dyn HttpClient>> {
        Err(missing(
            "HttpClient",
            "needed to download uncached media; inject the platform HTTP stack \
             or enable the 'desktop-shims' feature",
        ))
    }

    pub(super) fn file_system() -> Result<Arc<dyn FileSystemAccess>> {
        Err(missing(
            "FileSystemAccess",
            "needed for the disk cache; inject sandboxed app storage \
             or enable the 'desktop-shims' feature",
        ))
    }

    pub(super) fn network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
        Err(missing(
            "NetworkMonitor",
            "needed to pick a bitrate ceiling; inject ConnectivityManager / NWPathMonitor \
             or enable the 'desktop-shims' feature",
        ))
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    cache_size_mb: Option<usize>,
    engine_factory: Option<Arc<dyn MediaEngineFactory>>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
}

impl CoreConfigBuilder {
    /// Directory the media cache lives under. Required unless
    /// `desktop-shims` supplies the platform cache root.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn cache_size_mb(mut self, size_mb: usize) -> Self {
        self.cache_size_mb = Some(size_mb);
        self
    }

    pub fn engine_factory(mut self, factory: Arc<dyn MediaEngineFactory>) -> Self {
        self.engine_factory = Some(factory);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Resolve defaults, then validate.
    ///
    /// The engine factory is checked first since no shim can stand in for it.
    pub fn build(self) -> Result<CoreConfig> {
        let engine_factory = self.engine_factory.ok_or_else(|| {
            missing(
                "MediaEngineFactory",
                "the host must supply the decoder: ExoPlayer on Android, \
                 AVPlayer on iOS, a GStreamer or ffmpeg engine on desktop",
            )
        })?;

        let config = CoreConfig {
            cache_dir: self.cache_dir.map_or_else(defaults::cache_dir, Ok)?,
            cache_size_mb: self.cache_size_mb.unwrap_or(DEFAULT_CACHE_SIZE_MB),
            engine_factory,
            http_client: self.http_client.map_or_else(defaults::http_client, Ok)?,
            file_system: self.file_system.map_or_else(defaults::file_system, Ok)?,
            network_monitor: self
                .network_monitor
                .map_or_else(defaults::network_monitor, Ok)?,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            lifecycle_observer: self.lifecycle_observer,
        };

        config.validate()?;
        Ok(config)
    }
}
