//! Workspace facade crate.
//!
//! Host applications depend on `reelplay-workspace` and pick a feature
//! (`desktop-shims` or `playback`) instead of wiring `core-runtime` and
//! `core-playback` individually.

#[cfg(any(feature = "playback", feature = "desktop-shims"))]
pub use core_playback as playback;

#[cfg(any(feature = "playback", feature = "desktop-shims"))]
pub use core_runtime as runtime;
