//! # Desktop Bridges
//!
//! I/O bridges for running the reel playback core on macOS, Windows and
//! Linux, mostly for development hosts and integration tests:
//!
//! - [`ReqwestHttpClient`]: media downloads through `reqwest` + rustls
//! - [`TokioFileSystem`]: cache files through `tokio::fs`, with atomic writes
//! - [`DesktopNetworkMonitor`]: connectivity from a TCP reachability probe
//!
//! There is no desktop media engine; the host always supplies one.
//! `core-runtime` injects these bridges when its `desktop-shims` feature is
//! on and the host leaves them unset, using [`default_cache_root`] when no
//! cache directory is given.

mod filesystem;
mod http;
mod network;

pub use filesystem::{default_cache_root, TokioFileSystem};
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
