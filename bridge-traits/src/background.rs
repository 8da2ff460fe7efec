//! Screen Lifecycle
//!
//! The shared player follows the feed screen: it pauses when the screen is
//! hidden, resumes when it returns, and releases the engine when the screen
//! is destroyed.

use async_trait::async_trait;

use crate::error::Result;

/// Visibility of the screen hosting the feed.
///
/// Android maps `onStart`/`onStop`/`onDestroy`; iOS maps the view
/// controller appearance callbacks and scene phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Foreground,
    Background,
    /// The OS is about to suspend the process.
    Suspended,
    /// The screen is gone; the engine must be released.
    Destroyed,
}

impl LifecycleState {
    /// Whether video can be rendered.
    pub fn is_visible(&self) -> bool {
        matches!(self, LifecycleState::Foreground)
    }
}

#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    async fn get_state(&self) -> Result<LifecycleState>;

    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

#[async_trait]
pub trait LifecycleChangeStream: Send {
    /// Next transition; `None` once the host stops reporting.
    async fn next(&mut self) -> Option<LifecycleState>;
}
