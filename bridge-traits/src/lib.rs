//! # Host Bridge Traits
//!
//! The contract between the reel playback core and the platform it runs on.
//! The core owns policy (caching, bitrate, retry, preload, lifecycle); the
//! host supplies capabilities through these traits.
//!
//! | Capability | Trait | Desktop default |
//! |------------|-------|-----------------|
//! | Decode and render | [`MediaEngineFactory`] / [`MediaEngine`] | none, always host-supplied |
//! | Media downloads | [`HttpClient`] | `bridge_desktop::ReqwestHttpClient` |
//! | Cache files | [`FileSystemAccess`] | `bridge_desktop::TokioFileSystem` |
//! | Connectivity | [`NetworkMonitor`] | `bridge_desktop::DesktopNetworkMonitor` |
//! | Screen visibility | [`LifecycleObserver`] | none |
//! | Backoff timer | [`Sleeper`] | [`TokioSleeper`] |
//! | Log forwarding | [`LoggerSink`] | none |
//!
//! Bridges shared across tasks are `Send + Sync`. A [`MediaEngine`] is only
//! `Send`: the core confines each engine to one dispatcher task.
//!
//! Every bridge reports failures as [`BridgeError`]. Keep the HTTP status
//! when a server rejected a request; the core decides retryability from it.
//!
//! Enable the `mocks` feature for `mockall` doubles of [`HttpClient`] and
//! [`NetworkMonitor`].

pub mod background;
pub mod error;
pub mod http;
pub mod logging;
pub mod network;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use background::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use logging::{LogLevel, LogRecord, LoggerSink};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use playback::{
    DataSource, EngineConfig, EngineError, EngineErrorCode, EngineEvent, EngineEventSender,
    EngineState, LoadControl, MediaEngine, MediaEngineFactory, MediaSource, SourceType,
    StampedEvent, TrackSelection,
};
pub use storage::{FileEntry, FileSystemAccess};
pub use time::{Sleeper, TokioSleeper};

#[cfg(any(test, feature = "mocks"))]
pub use http::MockHttpClient;
#[cfg(any(test, feature = "mocks"))]
pub use network::MockNetworkMonitor;
