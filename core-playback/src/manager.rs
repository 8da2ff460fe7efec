//! # Playback Manager
//!
//! Owns the single shared engine session, the disk cache and the bitrate,
//! retry and preload policy. Feed screens call [`PlaybackManager::play`] with
//! a media URL; lifecycle hooks pause, resume and release it.
//!
//! ## State machine
//!
//! ```text
//!                 play()                pause()
//! Uninitialized ─────────> Ready <──────────────> Paused
//!       ^                   │  ^      resume()       │
//!       │          network  │  │ reconnect           │ network
//!       │             lost  v  │ (was playing)       │ lost
//!       │                  Stalled ──────────────────┘
//!       │                            reconnect (was paused) -> Paused
//!       └──────────── release() from any state
//! ```
//!
//! ## Concurrency
//!
//! Engine mutations go through the dispatcher task (see
//! [`dispatcher`](crate::dispatcher)). Backoff sleeps and network checks run
//! in the caller's task. Every `play()` takes a new request id and cancels
//! the previous call's token, so an older call stops at its next suspension
//! point and returns [`PlayOutcome::Superseded`]; its commands that still
//! reach the dispatcher are rejected there.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let manager = Arc::new(PlaybackManager::new(core_config, PlaybackConfig::default())?);
//! manager.start_watchers().await;
//! let mut events = manager.events()?;
//!
//! match manager.play("https://cdn.example.com/reels/42/master.m3u8").await {
//!     PlayOutcome::Ready => {}
//!     PlayOutcome::Retryable(err) => show_retry_banner(err),
//!     PlayOutcome::Failed(err) => show_error(err),
//!     PlayOutcome::Superseded => {}
//! }
//! ```

use crate::cache::CacheDataSourceFactory;
use crate::cache::CacheStore;
use crate::config::PlaybackConfig;
use crate::dispatcher::{spawn_dispatcher, DispatcherHandle, DispatcherParts};
use crate::error::{PlaybackError, Result};
use crate::network::{detect_profile, BandwidthMeter, BitrateTier, NetworkProfile};
use crate::preload::{self, PreloadOutcome};
use crate::retry::{RetryPolicy, RetryState};
use crate::selection::{engine_config, select_tier};
use crate::session::{ManagerState, SessionSnapshot, SessionState};
use crate::source::build_source;
use bridge_traits::background::{LifecycleObserver, LifecycleState};
use bridge_traits::network::NetworkInfo;
use bridge_traits::playback::EngineEventSender;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventHub, EventStream, PlaybackEvent};
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Result of a `play()` call. Failures are values, never panics or `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// The clip is prepared and playing.
    Ready,
    /// A transient failure with automatic retry disabled (`max_retries == 0`);
    /// the caller may try again.
    Retryable(PlaybackError),
    /// A terminal failure, or transient failures that exhausted the retry
    /// bound. The `Error` event still carries `retryable` for a manual retry.
    Failed(PlaybackError),
    /// A newer `play()` or `release()` replaced this request.
    Superseded,
}

impl PlayOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, PlayOutcome::Ready)
    }

    pub fn error(&self) -> Option<&PlaybackError> {
        match self {
            PlayOutcome::Retryable(e) | PlayOutcome::Failed(e) => Some(e),
            PlayOutcome::Ready | PlayOutcome::Superseded => None,
        }
    }
}

enum CacheSlot {
    Uninitialized,
    Ready(CacheDataSourceFactory),
    /// Setup failed; dependent requests fail with this error until
    /// `ensure_cache` is called again.
    Failed(PlaybackError),
}

#[derive(Debug, Default)]
struct Lifecycle {
    state: ManagerState,
    /// Resume when connectivity returns after a stall.
    resume_on_reconnect: bool,
}

#[derive(Debug, Clone, Copy)]
struct Controls {
    volume: f32,
    muted: bool,
}

/// Adaptive playback manager for the reels feed.
pub struct PlaybackManager {
    core: CoreConfig,
    config: PlaybackConfig,
    retry: RetryPolicy,
    hub: Arc<EventHub>,
    meter: Arc<BandwidthMeter>,
    cache: tokio::sync::Mutex<CacheSlot>,
    session: tokio::sync::Mutex<Option<DispatcherHandle>>,
    lifecycle: Mutex<Lifecycle>,
    latest_request: Arc<AtomicU64>,
    current_request: Mutex<CancellationToken>,
    controls: Mutex<Controls>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl PlaybackManager {
    /// Create a manager. Nothing is allocated until the first playback request.
    pub fn new(core: CoreConfig, config: PlaybackConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            retry: RetryPolicy::from(&config.retry),
            core,
            config,
            hub: Arc::new(EventHub::new()),
            meter: Arc::new(BandwidthMeter::new()),
            cache: tokio::sync::Mutex::new(CacheSlot::Uninitialized),
            session: tokio::sync::Mutex::new(None),
            lifecycle: Mutex::new(Lifecycle::default()),
            latest_request: Arc::new(AtomicU64::new(0)),
            current_request: Mutex::new(CancellationToken::new()),
            controls: Mutex::new(Controls {
                volume: 1.0,
                muted: false,
            }),
            watchers: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// The single-subscriber event stream. Fails on a second call.
    pub fn events(&self) -> core_runtime::Result<EventStream> {
        self.hub.take_stream()
    }

    /// Throughput estimate fed by the cache data source.
    pub fn bandwidth_meter(&self) -> &Arc<BandwidthMeter> {
        &self.meter
    }

    pub fn lifecycle_state(&self) -> ManagerState {
        self.lifecycle.lock().state
    }

    // ========================================================================
    // Cache & Player Setup
    // ========================================================================

    /// Set up the disk cache under `root_dir`.
    ///
    /// A no-op once initialized. After a failed setup this retries; implicit
    /// setup from `play()` keeps returning the recorded failure instead.
    #[instrument(skip(self))]
    pub async fn ensure_cache(&self, root_dir: &Path) -> Result<CacheDataSourceFactory> {
        let mut slot = self.cache.lock().await;
        if let CacheSlot::Ready(factory) = &*slot {
            return Ok(factory.clone());
        }
        self.open_cache(&mut slot, root_dir).await
    }

    async fn cache_factory(&self) -> Result<CacheDataSourceFactory> {
        let mut slot = self.cache.lock().await;
        match &*slot {
            CacheSlot::Ready(factory) => Ok(factory.clone()),
            CacheSlot::Failed(error) => Err(error.clone()),
            CacheSlot::Uninitialized => self.open_cache(&mut slot, &self.core.cache_dir).await,
        }
    }

    async fn open_cache(&self, slot: &mut CacheSlot, root_dir: &Path) -> Result<CacheDataSourceFactory> {
        let path = root_dir.join(&self.config.cache.cache_directory);

        match CacheStore::open(
            self.core.file_system.clone(),
            path,
            self.core.cache_size_bytes(),
        )
        .await
        {
            Ok(store) => {
                let factory = CacheDataSourceFactory::new(
                    Arc::new(store),
                    self.core.http_client.clone(),
                    self.meter.clone(),
                    self.config.cache.fetch_timeout(),
                );
                *slot = CacheSlot::Ready(factory.clone());
                Ok(factory)
            }
            Err(e) => {
                error!(error = %e, "Cache setup failed; playback unavailable");
                let error = match e {
                    PlaybackError::CacheUnavailable(_) => e,
                    other => PlaybackError::CacheUnavailable(other.to_string()),
                };
                *slot = CacheSlot::Failed(error.clone());
                Err(error)
            }
        }
    }

    /// Return the session, creating the engine on first use.
    #[instrument(skip(self))]
    pub async fn get_or_create_player(&self) -> Result<DispatcherHandle> {
        self.session_parts().await.map(|(handle, _)| handle)
    }

    async fn session_parts(&self) -> Result<(DispatcherHandle, CacheDataSourceFactory)> {
        let mut session = self.session.lock().await;

        if let Some(handle) = session.as_ref().filter(|handle| !handle.is_closed()) {
            let factory = self.cache_factory().await?;
            return Ok((handle.clone(), factory));
        }

        let factory = self.cache_factory().await?;
        let profile = detect_profile(self.core.network_monitor.as_ref()).await;
        let tier = select_tier(profile, false);
        let controls = *self.controls.lock();
        let output_volume = if controls.muted { 0.0 } else { controls.volume };

        let (event_sender, engine_events) = EngineEventSender::channel();
        let engine = self
            .core
            .engine_factory
            .create(
                engine_config(&self.config, tier, output_volume),
                event_sender.clone(),
            )
            .map_err(|e| {
                error!(error = %e, "Media engine creation failed");
                PlaybackError::EngineUnavailable(e.to_string())
            })?;

        let handle = spawn_dispatcher(DispatcherParts {
            engine,
            event_sender,
            engine_events,
            hub: self.hub.clone(),
            latest_request: self.latest_request.clone(),
            repeat_one: self.config.repeat_one,
            tier,
            volume: controls.volume,
            muted: controls.muted,
        });

        info!(
            session_id = %handle.session_id(),
            ?profile,
            ?tier,
            max_bps = self.config.bitrate.ceiling(tier),
            "Playback session created"
        );

        *session = Some(handle.clone());
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == ManagerState::Uninitialized {
                lifecycle.state = ManagerState::Ready;
            }
        }

        Ok((handle, factory))
    }

    async fn current_session(&self) -> Option<DispatcherHandle> {
        self.session
            .lock()
            .await
            .as_ref()
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Play `url`, retrying transient failures with backoff.
    #[instrument(skip(self), fields(url = %redact_url(url)))]
    pub async fn play(&self, url: &str) -> PlayOutcome {
        let request_id = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
        let token = {
            let mut current = self.current_request.lock();
            current.cancel();
            *current = CancellationToken::new();
            current.clone()
        };

        let (handle, factory) = match self.session_parts().await {
            Ok(parts) => parts,
            Err(e) => {
                if self.is_superseded(request_id) {
                    return PlayOutcome::Superseded;
                }
                self.emit_error(url, &e, false);
                return PlayOutcome::Failed(e);
            }
        };

        let mut retry = RetryState::new();
        let mut force_minimal = false;

        loop {
            if self.is_superseded(request_id) {
                return PlayOutcome::Superseded;
            }

            retry.record_attempt();
            let first = retry.attempts == 1;
            let result = self
                .attempt(&handle, &factory, url, request_id, &token, first, force_minimal)
                .await;

            let error = match result {
                Ok(()) => {
                    self.mark_playing();
                    info!(attempts = retry.attempts, "Playback ready");
                    return PlayOutcome::Ready;
                }
                Err(PlaybackError::Superseded) => return PlayOutcome::Superseded,
                Err(e) if self.is_superseded(request_id) => {
                    debug!(error = %e.redacted(), "Ignoring failure of superseded request");
                    return PlayOutcome::Superseded;
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                error!(error = %error.redacted(), class = ?error.class(), "Playback failed");
                self.emit_error(url, &error, false);
                return PlayOutcome::Failed(error);
            }

            retry.record_failure(error.clone());
            if !self.retry.can_retry(retry.retries()) {
                self.emit_error(url, &error, true);
                if retry.retries() == 0 {
                    warn!(error = %error.redacted(), "Transient playback failure, automatic retry disabled");
                    return PlayOutcome::Retryable(error);
                }
                error!(
                    error = %error.redacted(),
                    attempts = retry.attempts,
                    total_backoff_ms = retry.total_backoff.as_millis() as u64,
                    "Retries exhausted"
                );
                return PlayOutcome::Failed(error);
            }

            let next_retry = retry.retries() + 1;
            let delay = self.retry.backoff(next_retry);
            warn!(
                error = %error.redacted(),
                retry = next_retry,
                delay_ms = delay.as_millis() as u64,
                "Transient playback failure, backing off"
            );
            self.hub.emit(PlaybackEvent::Retrying {
                url: redact_url(url),
                attempt: next_retry,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::select! {
                _ = token.cancelled() => return PlayOutcome::Superseded,
                _ = self.core.sleeper.sleep(delay) => {}
            }
            retry.record_backoff(delay);
            force_minimal =
                self.retry.minimal_on_final_retry && self.retry.is_final_retry(next_retry);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        handle: &DispatcherHandle,
        factory: &CacheDataSourceFactory,
        url: &str,
        request_id: u64,
        token: &CancellationToken,
        first: bool,
        force_minimal: bool,
    ) -> Result<()> {
        let snapshot = handle.current();

        if first && snapshot.is_current_and_prepared(url) {
            debug!(state = ?snapshot.state, "Clip already prepared, ensuring playback");
            handle.set_play_when_ready(true).await?;
            if snapshot.state == SessionState::Buffering {
                return self.await_ready(handle, snapshot.generation, token).await;
            }
            return Ok(());
        }

        self.apply_tier(handle, &snapshot, force_minimal).await?;
        if self.is_superseded(request_id) {
            return Err(PlaybackError::Superseded);
        }

        let generation = match snapshot.queue_index(url) {
            Some(index) if first => handle.seek_to_queued(request_id, index).await?,
            _ => handle.load(request_id, build_source(url, factory)).await?,
        };

        self.await_ready(handle, generation, token).await
    }

    async fn apply_tier(
        &self,
        handle: &DispatcherHandle,
        snapshot: &SessionSnapshot,
        force_minimal: bool,
    ) -> Result<()> {
        let tier = if force_minimal {
            select_tier(NetworkProfile::Unknown, true)
        } else {
            detect_profile(self.core.network_monitor.as_ref()).await.tier()
        };

        if snapshot.tier != Some(tier) {
            handle
                .set_track_selection(tier, self.config.bitrate.track_selection(tier))
                .await?;
        }
        Ok(())
    }

    /// Wait until the source of `generation` is ready, fails, or is replaced.
    async fn await_ready(
        &self,
        handle: &DispatcherHandle,
        generation: u64,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut snapshots = handle.subscribe();

        let wait = async {
            loop {
                {
                    let snapshot = snapshots.borrow_and_update();
                    if snapshot.generation > generation {
                        return Err(PlaybackError::Superseded);
                    }
                    if snapshot.generation == generation {
                        match snapshot.state {
                            SessionState::Ready | SessionState::Ended => return Ok(()),
                            SessionState::Error => {
                                let error = match &snapshot.error {
                                    Some(engine_error) => PlaybackError::from(engine_error.clone()),
                                    None => PlaybackError::Engine("engine reported an error".to_string()),
                                };
                                return Err(error);
                            }
                            SessionState::Idle | SessionState::Buffering => {}
                        }
                    }
                }
                if snapshots.changed().await.is_err() {
                    return Err(PlaybackError::SessionClosed);
                }
            }
        };

        let timeout = self.config.prepare_timeout();
        tokio::select! {
            _ = token.cancelled() => Err(PlaybackError::Superseded),
            result = tokio::time::timeout(timeout, wait) => result.unwrap_or_else(|_| {
                Err(PlaybackError::Timeout(format!("not ready after {:?}", timeout)))
            }),
        }
    }

    fn is_superseded(&self, request_id: u64) -> bool {
        self.latest_request.load(Ordering::SeqCst) != request_id
    }

    fn mark_playing(&self) {
        let mut lifecycle = self.lifecycle.lock();
        match lifecycle.state {
            ManagerState::Stalled => lifecycle.resume_on_reconnect = true,
            _ => lifecycle.state = ManagerState::Ready,
        }
    }

    fn emit_error(&self, url: &str, error: &PlaybackError, retryable: bool) {
        self.hub.emit(PlaybackEvent::Error {
            url: Some(redact_url(url)),
            kind: error.kind(),
            message: error.redacted(),
            retryable,
        });
    }

    /// Queue an upcoming clip behind the current one.
    #[instrument(skip(self), fields(url = %redact_url(url)))]
    pub async fn preload(&self, url: &str) -> PreloadOutcome {
        let Some(handle) = self.current_session().await else {
            return PreloadOutcome::NoSession;
        };

        let snapshot = handle.current();
        if snapshot.queue_index(url).is_some() {
            return PreloadOutcome::AlreadyQueued;
        }

        let (profile, reported_kbps) = match self.core.network_monitor.get_network_info().await {
            Ok(info) => (NetworkProfile::from_info(&info), info.downstream_kbps),
            Err(e) => {
                warn!(error = %e, "Network capabilities unreadable");
                (NetworkProfile::Unknown, None)
            }
        };
        let throughput = preload::effective_throughput(reported_kbps, self.meter.estimate_kbps());
        if !preload::throughput_allows(&self.config.preload, profile, throughput) {
            debug!(?profile, ?throughput, floor = self.config.preload.min_throughput_kbps, "Network too slow to preload");
            return PreloadOutcome::SkippedSlowNetwork;
        }

        let current = snapshot.current_index.unwrap_or(0);
        let evict = preload::eviction_plan(&self.config.preload, snapshot.queue.len(), current);
        if !evict.is_empty() {
            if let Err(e) = handle.remove_items(evict).await {
                warn!(error = %e, "Failed to evict queue items outside the preload window");
            }
        }

        let snapshot = handle.current();
        let current = snapshot.current_index.unwrap_or(0);
        if preload::upcoming_count(snapshot.queue.len(), current) >= self.config.preload.max_items {
            return PreloadOutcome::SkippedQueueFull;
        }

        let factory = match self.cache_factory().await {
            Ok(factory) => factory,
            Err(e) => return PreloadOutcome::Failed(e),
        };

        let index = match handle.enqueue(build_source(url, &factory)).await {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e.redacted(), "Engine rejected preload");
                return PreloadOutcome::Failed(e);
            }
        };

        let cache_warmed = if self.config.preload.warm_cache {
            match factory.warm(url).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(error = %e.redacted(), "Cache warm-up failed");
                    false
                }
            }
        } else {
            false
        };

        debug!(index, cache_warmed, "Clip preloaded");
        PreloadOutcome::Queued {
            index,
            cache_warmed,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop rendering; the session and position are kept.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let Some(handle) = self.current_session().await else {
            debug!("Pause without a session");
            return Ok(());
        };

        handle.set_play_when_ready(false).await?;
        let snapshot = handle.query().await?;

        {
            let mut lifecycle = self.lifecycle.lock();
            match lifecycle.state {
                ManagerState::Stalled => lifecycle.resume_on_reconnect = false,
                _ => lifecycle.state = ManagerState::Paused,
            }
        }

        self.hub.emit(PlaybackEvent::Paused {
            url: snapshot.url.as_deref().map(redact_url),
            position_ms: snapshot.position.as_millis() as u64,
        });
        Ok(())
    }

    /// Resume rendering from the paused position.
    ///
    /// While stalled, playback resumes once connectivity returns.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<()> {
        let Some(handle) = self.current_session().await else {
            debug!("Resume without a session");
            return Ok(());
        };

        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == ManagerState::Stalled {
                lifecycle.resume_on_reconnect = true;
                return Ok(());
            }
        }

        handle.set_play_when_ready(true).await?;
        let snapshot = handle.query().await?;
        self.lifecycle.lock().state = ManagerState::Ready;

        self.hub.emit(PlaybackEvent::Resumed {
            url: snapshot.url.as_deref().map(redact_url),
            position_ms: snapshot.position.as_millis() as u64,
        });
        Ok(())
    }

    /// Release the engine and the cache handle. Safe to call repeatedly.
    #[instrument(skip(self))]
    pub async fn release(&self) {
        self.latest_request.fetch_add(1, Ordering::SeqCst);
        self.current_request.lock().cancel();

        let handle = self.session.lock().await.take();
        let released_engine = match handle {
            Some(handle) => {
                handle.release().await;
                true
            }
            None => false,
        };

        let slot = std::mem::replace(&mut *self.cache.lock().await, CacheSlot::Uninitialized);
        let closed_cache = match slot {
            CacheSlot::Ready(factory) => {
                factory.store().close().await;
                true
            }
            CacheSlot::Failed(_) | CacheSlot::Uninitialized => false,
        };

        *self.lifecycle.lock() = Lifecycle::default();

        if released_engine || closed_cache {
            info!(released_engine, closed_cache, "Playback manager released");
            self.hub.emit(PlaybackEvent::Released);
        } else {
            debug!("Release with nothing to release");
        }
    }

    /// Apply a host lifecycle transition.
    pub async fn handle_lifecycle(&self, state: LifecycleState) -> Result<()> {
        debug!(?state, "Lifecycle transition");
        match state {
            LifecycleState::Foreground => self.resume().await,
            LifecycleState::Background | LifecycleState::Suspended => self.pause().await,
            LifecycleState::Destroyed => {
                self.release().await;
                Ok(())
            }
        }
    }

    /// Connectivity changed: stall on loss, recover on reconnect, and
    /// refresh the bitrate ceiling for the new transport.
    #[instrument(skip(self, info), fields(status = ?info.status))]
    pub async fn on_network_change(&self, info: NetworkInfo) -> Result<()> {
        let Some(handle) = self.current_session().await else {
            return Ok(());
        };
        let state = self.lifecycle_state();
        let url = handle.current().url.as_deref().map(redact_url);

        if !info.is_connected() {
            if !matches!(state, ManagerState::Ready | ManagerState::Paused) {
                return Ok(());
            }

            let playing = state == ManagerState::Ready && handle.current().play_when_ready;
            handle.set_play_when_ready(false).await?;
            {
                let mut lifecycle = self.lifecycle.lock();
                lifecycle.state = ManagerState::Stalled;
                lifecycle.resume_on_reconnect = playing;
            }

            warn!(was_playing = playing, "Network lost, playback stalled");
            self.hub.emit(PlaybackEvent::Stalled { url: url.clone() });
            self.hub.emit(PlaybackEvent::Error {
                url,
                kind: core_runtime::events::ErrorKind::Network,
                message: "network connection lost".to_string(),
                retryable: true,
            });
            return Ok(());
        }

        let tier = NetworkProfile::from_info(&info).tier();
        if handle.current().tier != Some(tier) {
            handle
                .set_track_selection(tier, self.config.bitrate.track_selection(tier))
                .await?;
        }

        if state == ManagerState::Stalled {
            let resume = self.lifecycle.lock().resume_on_reconnect;
            if resume {
                handle.set_play_when_ready(true).await?;
            }
            {
                let mut lifecycle = self.lifecycle.lock();
                lifecycle.state = if resume {
                    ManagerState::Ready
                } else {
                    ManagerState::Paused
                };
                lifecycle.resume_on_reconnect = false;
            }

            info!(resumed = resume, ?tier, "Network restored");
            self.hub.emit(PlaybackEvent::Recovered { url });
        }
        Ok(())
    }

    /// Follow `observer` until its stream ends or the manager is dropped.
    pub async fn attach_lifecycle(
        self: &Arc<Self>,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<()> {
        let mut changes = observer.subscribe_changes().await?;

        // The screen may already be hidden when the host wires us up.
        match observer.get_state().await {
            Ok(state) if !state.is_visible() => {
                if let Err(e) = self.handle_lifecycle(state).await {
                    warn!(error = %e, ?state, "Initial lifecycle state not applied");
                }
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Initial lifecycle state unavailable"),
        }

        let manager = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            while let Some(state) = changes.next().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if let Err(e) = manager.handle_lifecycle(state).await {
                    warn!(error = %e, ?state, "Lifecycle transition failed");
                }
            }
            debug!("Lifecycle stream ended");
        });
        self.watchers.lock().push(task);
        Ok(())
    }

    /// Follow the host network monitor's change stream.
    pub async fn watch_network(self: &Arc<Self>) -> Result<()> {
        let mut changes = self.core.network_monitor.subscribe_changes().await?;
        let manager: Weak<Self> = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            while let Some(info) = changes.next().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if let Err(e) = manager.on_network_change(info).await {
                    warn!(error = %e, "Network change handling failed");
                }
            }
            debug!("Network change stream ended");
        });
        self.watchers.lock().push(task);
        Ok(())
    }

    /// Start the network watcher and, when configured, the lifecycle watcher.
    ///
    /// A bridge without change notifications is logged and skipped.
    pub async fn start_watchers(self: &Arc<Self>) {
        if let Err(e) = self.watch_network().await {
            warn!(error = %e, "Network change notifications unavailable");
        }
        if let Some(observer) = self.core.lifecycle_observer.clone() {
            if let Err(e) = self.attach_lifecycle(observer).await {
                warn!(error = %e, "Lifecycle notifications unavailable");
            }
        }
    }

    // ========================================================================
    // Session Controls
    // ========================================================================

    /// Set output volume in `0.0..=1.0`.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }

        let muted = {
            let mut controls = self.controls.lock();
            controls.volume = volume;
            controls.muted
        };
        if let Some(handle) = self.current_session().await {
            handle.set_volume(volume, muted).await?;
        }
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        let volume = {
            let mut controls = self.controls.lock();
            controls.muted = muted;
            controls.volume
        };
        if let Some(handle) = self.current_session().await {
            handle.set_volume(volume, muted).await?;
        }
        Ok(())
    }

    /// Playback progress in `[0, 1]`; `0.0` without a session.
    pub async fn progress(&self) -> f32 {
        self.snapshot().await.progress()
    }

    /// Fresh session snapshot; the default snapshot without a session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        match self.current_session().await {
            Some(handle) => handle.query().await.unwrap_or_default(),
            None => SessionSnapshot::default(),
        }
    }

    /// Tier currently applied to track selection, if a session exists.
    pub async fn current_tier(&self) -> Option<BitrateTier> {
        self.current_session().await.and_then(|handle| handle.current().tier)
    }
}

impl Drop for PlaybackManager {
    fn drop(&mut self) {
        for task in self.watchers.get_mut().drain(..) {
            task.abort();
        }
        self.current_request.get_mut().cancel();
    }
}
