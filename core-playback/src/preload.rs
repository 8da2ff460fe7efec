//! # Preload Policy
//!
//! Decides whether an upcoming clip may be added to the engine queue and
//! which queued clips fall outside the window kept around the current one.
//!
//! Throughput comes from the host's downstream estimate when it reports one,
//! otherwise from the cache data source's [`BandwidthMeter`](crate::network::BandwidthMeter).
//! With no estimate at all, only an unmetered (WiFi) network may preload.

use crate::config::PreloadConfig;
use crate::error::PlaybackError;
use crate::network::NetworkProfile;

/// Result of a `preload()` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PreloadOutcome {
    /// Added to the engine queue at `index`.
    Queued { index: usize, cache_warmed: bool },
    /// Already queued or currently playing.
    AlreadyQueued,
    /// Throughput is below the floor, or unknown off WiFi.
    SkippedSlowNetwork,
    /// The configured number of upcoming items is already queued.
    SkippedQueueFull,
    /// No session to preload into.
    NoSession,
    /// The engine rejected the new queue item.
    Failed(PlaybackError),
}

impl PreloadOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, PreloadOutcome::Queued { .. })
    }
}

/// Throughput estimate used for the preload decision, in kbps.
pub fn effective_throughput(reported_kbps: Option<u32>, measured_kbps: Option<u32>) -> Option<u32> {
    reported_kbps.or(measured_kbps)
}

/// Whether the network is fast enough to preload.
pub fn throughput_allows(
    config: &PreloadConfig,
    profile: NetworkProfile,
    throughput_kbps: Option<u32>,
) -> bool {
    match throughput_kbps {
        Some(kbps) => kbps >= config.min_throughput_kbps,
        None => profile == NetworkProfile::Wifi,
    }
}

/// Queue indices outside `[current - window_behind, current + max_items]`,
/// highest first so they can be removed one by one.
pub fn eviction_plan(config: &PreloadConfig, queue_len: usize, current: usize) -> Vec<usize> {
    let first_kept = current.saturating_sub(config.window_behind);
    let last_kept = current.saturating_add(config.max_items);

    (0..queue_len)
        .rev()
        .filter(|&index| index < first_kept || index > last_kept)
        .collect()
}

/// Items queued after the current one.
pub fn upcoming_count(queue_len: usize, current: usize) -> usize {
    queue_len.saturating_sub(current + 1)
}
