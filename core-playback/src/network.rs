//! # Network Classification
//!
//! Turns host connectivity reports into the bitrate tier used for track
//! selection, and keeps a running throughput estimate from the cache data
//! source's own downloads.

use bridge_traits::network::{NetworkInfo, NetworkMonitor, NetworkType};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Transport classification at the time of a play or preload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkProfile {
    /// WiFi or ethernet (unmetered).
    Wifi,
    /// Mobile data.
    Cellular,
    /// Disconnected, unreadable, or a transport we cannot classify.
    Unknown,
}

impl NetworkProfile {
    pub fn from_info(info: &NetworkInfo) -> Self {
        if !info.is_connected() {
            return NetworkProfile::Unknown;
        }

        match info.network_type {
            Some(NetworkType::WiFi) | Some(NetworkType::Ethernet) => NetworkProfile::Wifi,
            Some(NetworkType::Cellular) => NetworkProfile::Cellular,
            Some(NetworkType::Other) | None => NetworkProfile::Unknown,
        }
    }

    /// Bitrate tier applied for this profile.
    pub fn tier(&self) -> BitrateTier {
        match self {
            NetworkProfile::Wifi => BitrateTier::High,
            NetworkProfile::Cellular => BitrateTier::Low,
            NetworkProfile::Unknown => BitrateTier::Minimal,
        }
    }
}

/// Maximum-bitrate bucket used for track selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitrateTier {
    High,
    Low,
    Minimal,
}

/// Classify the current network. Read failures count as [`NetworkProfile::Unknown`].
pub async fn detect_profile(monitor: &dyn NetworkMonitor) -> NetworkProfile {
    match monitor.get_network_info().await {
        Ok(info) => {
            let profile = NetworkProfile::from_info(&info);
            debug!(?profile, network_type = ?info.network_type, "Network classified");
            profile
        }
        Err(e) => {
            warn!(error = %e, "Network capabilities unreadable, using minimal tier");
            NetworkProfile::Unknown
        }
    }
}

/// Weight of the newest sample in the moving average.
const DEFAULT_ALPHA: f64 = 0.3;

/// Samples shorter than this are ignored; timer resolution dominates them.
const MIN_SAMPLE_DURATION: Duration = Duration::from_millis(5);

/// Exponentially weighted moving average of download throughput.
#[derive(Debug)]
pub struct BandwidthMeter {
    alpha: f64,
    estimate_bps: Mutex<Option<f64>>,
}

impl Default for BandwidthMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl BandwidthMeter {
    pub fn new() -> Self {
        Self::with_alpha(DEFAULT_ALPHA)
    }

    /// `alpha` is clamped to `(0, 1]`.
    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            estimate_bps: Mutex::new(None),
        }
    }

    /// Record one completed download of `bytes` that took `elapsed`.
    pub fn record(&self, bytes: u64, elapsed: Duration) {
        if bytes == 0 || elapsed < MIN_SAMPLE_DURATION {
            return;
        }

        let sample = (bytes as f64 * 8.0) / elapsed.as_secs_f64();
        let mut estimate = self.estimate_bps.lock();
        *estimate = Some(match *estimate {
            Some(previous) => self.alpha * sample + (1.0 - self.alpha) * previous,
            None => sample,
        });
    }

    /// Current estimate in kilobits per second, `None` before the first sample.
    pub fn estimate_kbps(&self) -> Option<u32> {
        self.estimate_bps
            .lock()
            .map(|bps| (bps / 1000.0).min(u32::MAX as f64) as u32)
    }

    pub fn reset(&self) {
        *self.estimate_bps.lock() = None;
    }
}
