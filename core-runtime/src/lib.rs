//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the reel playback core:
//! - Logging and tracing infrastructure
//! - Configuration management and bridge validation
//! - The single-subscriber playback event channel
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the playback crate depends
//! on. It establishes the logging conventions, the fail-fast bridge wiring and
//! the event types the UI consumes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{ErrorKind, EventHub, EventStream, PlaybackEvent};
