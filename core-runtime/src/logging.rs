//! # Logging
//!
//! Installs the global `tracing` subscriber for the playback core:
//!
//! - a formatting layer (`Pretty`, `Json` or `Compact`) on stdout
//! - an [`EnvFilter`] that lets the workspace crates through at the chosen
//!   level and holds HTTP internals at `warn`
//! - an optional bridge to the host's [`LoggerSink`] (Logcat, `os_log`),
//!   which receives a [`LogRecord`] per event
//!
//! Events emitted inside a `playback_session` span carry that span's
//! `session_id` into the forwarded record, so host logs can be grouped per
//! player instance.
//!
//! Setting `REELPLAY_LOG` (same syntax as `RUST_LOG`) overrides the
//! configured filter.
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_logger_sink(Arc::new(LogcatSink::new())),
//! )?;
//! ```
//!
//! Media URLs can carry signed query parameters; log them through
//! [`redact_url`], and free text that may embed one through
//! [`redact_urls_in`].

use crate::error::{Error, Result};
use bridge_traits::logging::{LogLevel, LogRecord, LoggerSink};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;
use url::{form_urlencoded, Url};

/// Environment variable that replaces the configured filter.
pub const FILTER_ENV: &str = "REELPLAY_LOG";

/// Span opened by the playback dispatcher around each session.
pub const SESSION_SPAN: &str = "playback_session";

const WORKSPACE_TARGETS: &[&str] = &[
    "reelplay_workspace",
    "core_runtime",
    "core_playback",
    "bridge_traits",
    "bridge_desktop",
];

const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "rustls", "reqwest"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; for local development.
    Pretty,
    /// One JSON object per line.
    Json,
    /// Single-line text.
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for the workspace crates when no custom filter is set.
    pub level: LogLevel,
    /// Full `EnvFilter` directive string, replacing the generated one.
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open/close in the pretty format; include span context in JSON.
    pub span_events: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            span_events: false,
            ansi: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("span_events", &self.span_events)
            .field("ansi", &self.ansi)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    /// Directive string the filter is built from, before any
    /// `REELPLAY_LOG` override.
    pub fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }

        let level = self.level.as_str();
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .chain(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber. Fails on a bad filter or when a global
/// subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let directives = std::env::var(FILTER_ENV).unwrap_or_else(|_| config.directives());
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter {:?}: {}", directives, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(output_layer(&config))
        .with(config.logger_sink.clone().map(HostSinkLayer::new))
        .try_init()
        .map_err(|e| Error::Config(format!("Logging already initialized: {}", e)))
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

fn output_layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = tracing_subscriber::fmt::layer().with_ansi(config.ansi);

    match config.format {
        LogFormat::Pretty => base
            .pretty()
            .with_span_events(if config.span_events {
                FmtSpan::NEW | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            })
            .boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(config.span_events)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// Session id recorded on a `playback_session` span.
struct SessionId(String);

/// Forwards events to the host [`LoggerSink`].
struct HostSinkLayer {
    sink: Arc<dyn LoggerSink>,
}

impl HostSinkLayer {
    fn new(sink: Arc<dyn LoggerSink>) -> Self {
        Self { sink }
    }

    fn deliver(&self, record: LogRecord) {
        let sink = Arc::clone(&self.sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.log(record).await {
                        eprintln!("log sink rejected record: {}", e);
                    }
                });
            }
            // No runtime on this thread: deliver inline.
            Err(_) => match tokio::runtime::Builder::new_current_thread().build() {
                Ok(rt) => {
                    if let Err(e) = rt.block_on(sink.log(record)) {
                        eprintln!("log sink rejected record: {}", e);
                    }
                }
                Err(e) => eprintln!("log sink unreachable: {}", e),
            },
        }
    }
}

impl<S> Layer<S> for HostSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != SESSION_SPAN {
            return;
        }
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        if let (Some(session_id), Some(span)) = (fields.take("session_id"), ctx.span(id)) {
            span.extensions_mut().insert(SessionId(session_id));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = log_level(*event.metadata().level());
        if level < self.sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .take("message")
            .unwrap_or_else(|| event.metadata().name().to_string());
        let mut record = LogRecord::new(level, event.metadata().target(), message);
        record.fields = fields.values;

        let session_id = ctx.event_scope(event).and_then(|scope| {
            scope
                .from_root()
                .find_map(|span| span.extensions().get::<SessionId>().map(|id| id.0.clone()))
        });
        if let Some(session_id) = session_id {
            record = record.with_session_id(session_id);
        }

        self.deliver(record);
    }
}

#[derive(Default)]
struct FieldCollector {
    values: BTreeMap<String, String>,
}

impl FieldCollector {
    fn take(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.values.insert(field.name().to_string(), value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.values.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.values
            .insert(field.name().to_string(), format!("{:?}", value));
    }
}

fn log_level(level: Level) -> LogLevel {
    match level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

/// Whether a query parameter carries a credential: `token`-like names,
/// CDN signing parameters and every `x-amz-*` parameter.
pub fn is_sensitive_param(name: &str) -> bool {
    const SIGNING_PARAMS: &[&str] = &[
        "sig",
        "signature",
        "key",
        "api_key",
        "expires",
        "policy",
        "password",
        "secret",
        "authorization",
    ];

    let name = name.to_ascii_lowercase();
    name.contains("token") || name.starts_with("x-amz-") || SIGNING_PARAMS.contains(&name.as_str())
}

const REDACTED: &str = "[REDACTED]";

/// Strip credentials from a media URL: the userinfo password is dropped and
/// the values of credential-bearing query parameters become `[REDACTED]`.
/// Parameter names are matched after percent-decoding. Everything else,
/// including the fragment, is kept.
///
/// ```
/// use core_runtime::logging::redact_url;
///
/// assert_eq!(
///     redact_url("https://cdn.example.com/v/1.m3u8?token=abc&quality=hd"),
///     "https://cdn.example.com/v/1.m3u8?token=[REDACTED]&quality=hd"
/// );
/// ```
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return redact_unparsed(raw);
    };

    if url.password().is_some() {
        // Only cannot-be-a-base URLs refuse this, and those have no userinfo.
        let _ = url.set_password(None);
    }
    if let Some(query) = url.query().map(redact_query) {
        url.set_query(Some(&query));
    }
    url.to_string()
}

/// Redact every `http(s)://` URL embedded in free text, such as an engine
/// error message.
pub fn redact_urls_in(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| rest.find(scheme))
        .min()
    {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>'))
            .unwrap_or(tail.len());
        out.push_str(&redact_url(&tail[..end]));
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

// Relative or malformed input: only the query is rewritten.
fn redact_unparsed(raw: &str) -> String {
    let (head, fragment) = match raw.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (raw, None),
    };
    let Some((base, query)) = head.split_once('?') else {
        return raw.to_string();
    };

    let mut out = format!("{}?{}", base, redact_query(query));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn redact_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| {
            let raw_name = pair.split_once('=').map_or(pair, |(name, _)| name);
            let sensitive = form_urlencoded::parse(raw_name.as_bytes())
                .next()
                .is_some_and(|(name, _)| is_sensitive_param(&name));
            if sensitive {
                format!("{}={}", raw_name, REDACTED)
            } else {
                pair.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}
