//! Engine configuration and bitrate tier selection.

use crate::config::PlaybackConfig;
use crate::network::{BitrateTier, NetworkProfile};
use bridge_traits::playback::EngineConfig;

/// Tier for the next attempt. `force_minimal` overrides the network profile.
pub fn select_tier(profile: NetworkProfile, force_minimal: bool) -> BitrateTier {
    if force_minimal {
        BitrateTier::Minimal
    } else {
        profile.tier()
    }
}

/// Full engine configuration for a new engine instance.
pub fn engine_config(config: &PlaybackConfig, tier: BitrateTier, volume: f32) -> EngineConfig {
    EngineConfig {
        load_control: config.buffer.load_control(),
        track_selection: config.bitrate.track_selection(tier),
        repeat_one: config.repeat_one,
        volume: volume.clamp(0.0, 1.0),
    }
}
