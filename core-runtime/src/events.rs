//! # Playback Event Channel
//!
//! Typed events published by the playback manager and consumed by the UI.
//!
//! ## Overview
//!
//! The channel has exactly one consumer. The manager owns an [`EventHub`];
//! the UI takes the receiving half once through [`EventHub::take_stream`]
//! and drains it for as long as the feed screen lives. A second call fails
//! with [`Error::AlreadySubscribed`] instead of silently splitting events
//! between two readers.
//!
//! ```text
//! ┌─────────────────┐   emit    ┌──────────┐   recv   ┌────────────┐
//! │ PlaybackManager ├──────────>│ EventHub ├─────────>│ Feed / UI  │
//! └─────────────────┘           │ (bounded │          └────────────┘
//! ┌─────────────────┐   emit    │   mpsc)  │
//! │ Engine dispatch ├──────────>│          │
//! └─────────────────┘           └──────────┘
//! ```
//!
//! The buffer is bounded. When the consumer falls behind by more than
//! [`DEFAULT_EVENT_BUFFER_SIZE`] events, new events are dropped and logged;
//! playback itself never waits on the UI.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventHub, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let hub = EventHub::new();
//! let mut stream = hub.take_stream().unwrap();
//!
//! hub.emit(PlaybackEvent::Released);
//! assert_eq!(stream.recv().await, Some(PlaybackEvent::Released));
//! # }
//! ```

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default number of undelivered events kept for the subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Coarse failure category carried by [`PlaybackEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection failure or drop
    Network,
    /// Prepare or read timed out
    Timeout,
    /// Server rejected the request
    HttpStatus,
    /// Media does not exist
    NotFound,
    /// Network or storage permission missing
    PermissionDenied,
    /// Container or codec could not be decoded
    Decode,
    /// Disk cache could not be set up
    CacheUnavailable,
    /// Engine could not be created or rejected a command
    Engine,
    /// Anything else
    Unknown,
}

/// Events related to reel playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Engine is loading media.
    Buffering {
        /// Media URL (redacted)
        url: String,
    },
    /// Media is prepared and playing (or ready to play).
    Ready {
        /// Media URL (redacted)
        url: String,
    },
    /// A transient failure is being retried after a backoff.
    Retrying {
        /// Media URL (redacted)
        url: String,
        /// Retry number, starting at 1
        attempt: u32,
        /// Backoff before the retry (milliseconds)
        delay_ms: u64,
    },
    /// Playback failed.
    Error {
        /// Media URL (redacted) if known
        url: Option<String>,
        /// Failure category
        kind: ErrorKind,
        /// Human-readable error message
        message: String,
        /// Whether a later attempt may succeed
        retryable: bool,
    },
    /// Network connectivity was lost; playback is paused.
    Stalled {
        /// Media URL (redacted) if a clip was loaded
        url: Option<String>,
    },
    /// Connectivity came back after a stall.
    Recovered {
        /// Media URL (redacted) if a clip was loaded
        url: Option<String>,
    },
    /// Playback paused.
    Paused {
        /// Media URL (redacted) if a clip was loaded
        url: Option<String>,
        /// Position when paused (milliseconds)
        position_ms: u64,
    },
    /// Playback resumed after pause.
    Resumed {
        /// Media URL (redacted) if a clip was loaded
        url: Option<String>,
        /// Position when resumed (milliseconds)
        position_ms: u64,
    },
    /// The current clip reached its end (only with looping disabled).
    Ended {
        /// Media URL (redacted)
        url: String,
    },
    /// The engine and cache handle were released.
    Released,
}

impl PlaybackEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            PlaybackEvent::Buffering { .. } => "Buffering",
            PlaybackEvent::Ready { .. } => "Playback ready",
            PlaybackEvent::Retrying { .. } => "Retrying playback",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::Stalled { .. } => "Playback stalled",
            PlaybackEvent::Recovered { .. } => "Playback recovered",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Ended { .. } => "Playback ended",
            PlaybackEvent::Released => "Player released",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PlaybackEvent::Error { retryable: false, .. } => EventSeverity::Error,
            PlaybackEvent::Error { .. }
            | PlaybackEvent::Stalled { .. }
            | PlaybackEvent::Retrying { .. } => EventSeverity::Warning,
            PlaybackEvent::Ready { .. } | PlaybackEvent::Released => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// Owner of the single-subscriber playback event channel.
pub struct EventHub {
    sender: mpsc::Sender<PlaybackEvent>,
    receiver: Mutex<Option<mpsc::Receiver<PlaybackEvent>>>,
}

impl EventHub {
    /// Creates a hub with the default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Creates a hub buffering at most `capacity` undelivered events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Publishes an event without waiting.
    ///
    /// Returns `false` when the event was dropped because the buffer is full
    /// or the subscriber went away.
    pub fn emit(&self, event: PlaybackEvent) -> bool {
        debug!(
            event = event.description(),
            severity = ?event.severity(),
            "Publishing playback event"
        );
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event = event.description(), "Event buffer full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Hands out the receiving half. Succeeds exactly once.
    pub fn take_stream(&self) -> Result<EventStream> {
        self.receiver
            .lock()
            .take()
            .map(EventStream::new)
            .ok_or(Error::AlreadySubscribed)
    }

    /// Returns `true` once the stream was taken.
    pub fn is_subscribed(&self) -> bool {
        self.receiver.lock().is_none()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&PlaybackEvent) -> bool + Send + Sync>;

/// Receiving half of the playback event channel, with optional filtering.
pub struct EventStream {
    receiver: mpsc::Receiver<PlaybackEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    fn new(receiver: mpsc::Receiver<PlaybackEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlaybackEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &PlaybackEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// Returns `None` once the hub is dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<PlaybackEvent> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<PlaybackEvent> {
        loop {
            let event = self.receiver.try_recv().ok()?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(url: &str) -> PlaybackEvent {
        PlaybackEvent::Ready {
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_stream_receives_emitted_events_in_order() {
        let hub = EventHub::new();
        let mut stream = hub.take_stream().unwrap();

        assert!(hub.emit(ready("a")));
        assert!(hub.emit(PlaybackEvent::Released));

        assert_eq!(stream.recv().await, Some(ready("a")));
        assert_eq!(stream.recv().await, Some(PlaybackEvent::Released));
    }

    #[tokio::test]
    async fn test_stream_can_only_be_taken_once() {
        let hub = EventHub::new();
        assert!(!hub.is_subscribed());
        let _stream = hub.take_stream().unwrap();
        assert!(hub.is_subscribed());
        assert!(matches!(hub.take_stream(), Err(Error::AlreadySubscribed)));
    }

    #[tokio::test]
    async fn test_events_before_subscription_are_buffered() {
        let hub = EventHub::new();
        hub.emit(ready("early"));

        let mut stream = hub.take_stream().unwrap();
        assert_eq!(stream.try_recv(), Some(ready("early")));
        assert_eq!(stream.try_recv(), None);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_new_events() {
        let hub = EventHub::with_capacity(1);
        assert!(hub.emit(ready("first")));
        assert!(!hub.emit(ready("second")));

        let mut stream = hub.take_stream().unwrap();
        assert_eq!(stream.try_recv(), Some(ready("first")));
        assert_eq!(stream.try_recv(), None);
    }

    #[tokio::test]
    async fn test_emit_after_stream_dropped() {
        let hub = EventHub::new();
        drop(hub.take_stream().unwrap());
        assert!(!hub.emit(PlaybackEvent::Released));
    }

    #[tokio::test]
    async fn test_stream_filter() {
        let hub = EventHub::new();
        let mut errors = hub
            .take_stream()
            .unwrap()
            .filter(|event| matches!(event, PlaybackEvent::Error { .. }));

        hub.emit(ready("a"));
        hub.emit(PlaybackEvent::Error {
            url: Some("a".to_string()),
            kind: ErrorKind::Decode,
            message: "bad codec".to_string(),
            retryable: false,
        });

        let event = errors.recv().await.unwrap();
        assert_eq!(event.severity(), EventSeverity::Error);
        assert_eq!(errors.try_recv(), None);
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_hub_dropped() {
        let hub = EventHub::new();
        let mut stream = hub.take_stream().unwrap();
        hub.emit(PlaybackEvent::Released);
        drop(hub);

        assert_eq!(stream.recv().await, Some(PlaybackEvent::Released));
        assert_eq!(stream.recv().await, None);
    }

    #[test]
    fn test_severity() {
        let retryable = PlaybackEvent::Error {
            url: None,
            kind: ErrorKind::Network,
            message: "reset".to_string(),
            retryable: true,
        };
        assert_eq!(retryable.severity(), EventSeverity::Warning);
        assert_eq!(
            PlaybackEvent::Stalled { url: None }.severity(),
            EventSeverity::Warning
        );
        assert_eq!(ready("a").severity(), EventSeverity::Info);
        assert_eq!(
            PlaybackEvent::Paused {
                url: None,
                position_ms: 0
            }
            .severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = PlaybackEvent::Retrying {
            url: "https://cdn.example.com/a.mp4".to_string(),
            attempt: 2,
            delay_ms: 2000,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"Retrying\""));
        let back: PlaybackEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
