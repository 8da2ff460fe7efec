//! # Playback Error Types
//!
//! Error types for reel playback, grouped the way the manager reacts to them:
//! setup failures, transient failures that are retried with backoff, and
//! terminal failures that are surfaced immediately.

use bridge_traits::{BridgeError, EngineError, EngineErrorCode};
use core_runtime::events::ErrorKind;
use core_runtime::logging::redact_urls_in;
use thiserror::Error;

/// How the manager reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The manager itself is not usable (cache directory, engine creation).
    /// Fatal until setup is retried explicitly.
    Setup,
    /// Connectivity problem; retried with backoff.
    Transient,
    /// Retrying the same URL will not help.
    Terminal,
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Setup Errors
    // ========================================================================
    /// Cache directory or index could not be set up.
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Media engine could not be created.
    #[error("Media engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Playback configuration failed validation.
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// The engine dispatcher stopped while a request was in flight.
    #[error("Playback session closed")]
    SessionClosed,

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// Connection failed or dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// Prepare or fetch timed out.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Server answered with a non-success status.
    #[error("HTTP status {status}: {url}")]
    HttpStatus { status: u16, url: String },

    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Media does not exist.
    #[error("Media not found: {0}")]
    NotFound(String),

    /// Network or storage permission missing.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Container or codec could not be decoded.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Engine failed without a recognizable category.
    #[error("Engine error: {0}")]
    Engine(String),

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// Invalid volume value (must be in range [0.0, 1.0]).
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    /// Engine rejected a command.
    #[error("Engine command failed: {0}")]
    EngineCommand(String),

    /// A newer playback request replaced this one.
    #[error("Superseded by a newer playback request")]
    Superseded,

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Cache read or write failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Maps an HTTP status to the matching error.
    ///
    /// 401/403 become permission errors and 404/410 not-found errors.
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        let url = url.into();
        match status {
            401 | 403 => PlaybackError::PermissionDenied(format!("HTTP {} for {}", status, url)),
            404 | 410 => PlaybackError::NotFound(url),
            _ => PlaybackError::HttpStatus { status, url },
        }
    }

    /// Display text with credentials stripped from any embedded URL, for
    /// logs and UI events.
    pub fn redacted(&self) -> String {
        redact_urls_in(&self.to_string())
    }

    /// Returns how the manager should react to this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            PlaybackError::CacheUnavailable(_)
            | PlaybackError::EngineUnavailable(_)
            | PlaybackError::InvalidConfig(_)
            | PlaybackError::SessionClosed => ErrorClass::Setup,

            PlaybackError::Network(_) | PlaybackError::Timeout(_) | PlaybackError::Engine(_) => {
                ErrorClass::Transient
            }

            PlaybackError::HttpStatus { status, .. } => {
                if is_retryable_status(*status) {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Terminal
                }
            }

            PlaybackError::NotFound(_)
            | PlaybackError::PermissionDenied(_)
            | PlaybackError::Decode(_)
            | PlaybackError::InvalidVolume(_)
            | PlaybackError::EngineCommand(_)
            | PlaybackError::Superseded
            | PlaybackError::CacheError(_)
            | PlaybackError::Internal(_) => ErrorClass::Terminal,
        }
    }

    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Network(_) | PlaybackError::Timeout(_) | PlaybackError::HttpStatus { .. }
        )
    }

    /// Returns `true` if this error is related to media format/codec issues.
    pub fn is_format_error(&self) -> bool {
        matches!(self, PlaybackError::Decode(_))
    }

    /// Category reported to the UI.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::CacheUnavailable(_) | PlaybackError::CacheError(_) => {
                ErrorKind::CacheUnavailable
            }
            PlaybackError::EngineUnavailable(_)
            | PlaybackError::EngineCommand(_)
            | PlaybackError::SessionClosed => ErrorKind::Engine,
            PlaybackError::Network(_) => ErrorKind::Network,
            PlaybackError::Timeout(_) => ErrorKind::Timeout,
            PlaybackError::HttpStatus { .. } => ErrorKind::HttpStatus,
            PlaybackError::NotFound(_) => ErrorKind::NotFound,
            PlaybackError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            PlaybackError::Decode(_) => ErrorKind::Decode,
            PlaybackError::InvalidConfig(_)
            | PlaybackError::Engine(_)
            | PlaybackError::InvalidVolume(_)
            | PlaybackError::Superseded
            | PlaybackError::Internal(_) => ErrorKind::Unknown,
        }
    }
}

/// Server-side and throttling statuses worth another attempt.
fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

impl From<BridgeError> for PlaybackError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Network(message) => PlaybackError::Network(message),
            BridgeError::HttpStatus { status, url } => PlaybackError::from_status(status, url),
            BridgeError::PermissionDenied(message) => PlaybackError::PermissionDenied(message),
            BridgeError::Io(e) => PlaybackError::CacheError(e.to_string()),
            BridgeError::NotAvailable(message) | BridgeError::OperationFailed(message) => {
                PlaybackError::Internal(message)
            }
        }
    }
}

impl From<EngineError> for PlaybackError {
    fn from(error: EngineError) -> Self {
        match error.code {
            EngineErrorCode::Network => PlaybackError::Network(error.message),
            EngineErrorCode::Timeout => PlaybackError::Timeout(error.message),
            EngineErrorCode::HttpStatus(status) => PlaybackError::from_status(status, error.message),
            EngineErrorCode::NotFound => PlaybackError::NotFound(error.message),
            EngineErrorCode::PermissionDenied => PlaybackError::PermissionDenied(error.message),
            EngineErrorCode::Decode => PlaybackError::Decode(error.message),
            EngineErrorCode::Unknown => PlaybackError::Engine(error.message),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
