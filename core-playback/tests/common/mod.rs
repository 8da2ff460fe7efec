//! Hand-written fakes for the host bridges.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::background::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::network::{NetworkChangeStream, NetworkInfo, NetworkMonitor};
use bridge_traits::playback::{
    EngineConfig, EngineError, EngineErrorCode, EngineEvent, EngineEventSender, EngineState,
    MediaEngine, MediaEngineFactory, MediaSource, SourceType, TrackSelection,
};
use bridge_traits::storage::{FileEntry, FileSystemAccess};
use bridge_traits::time::Sleeper;
use bytes::Bytes;
use core_playback::{PlaybackConfig, PlaybackManager};
use core_runtime::config::CoreConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Media engine
// ============================================================================

/// What the fake engine does when an item is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareBehavior {
    /// Buffering, then Ready.
    Ready,
    /// Buffering, then the error.
    Fail(EngineErrorCode),
    /// Buffering forever.
    Hang,
}

#[derive(Debug, Default)]
pub struct EngineLog {
    /// `set_source` calls, in order.
    pub loaded: Vec<(String, SourceType)>,
    /// Current queue URLs.
    pub queue: Vec<String>,
    pub current: Option<usize>,
    pub seeks: Vec<usize>,
    pub prepares: usize,
    pub play_when_ready: bool,
    pub track_selections: Vec<TrackSelection>,
    pub volumes: Vec<f32>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub released: bool,
}

/// Scripted engine shared between the factory and the tests.
#[derive(Clone, Default)]
pub struct EngineScript {
    pub log: Arc<Mutex<EngineLog>>,
    behaviors: Arc<Mutex<HashMap<String, PrepareBehavior>>>,
}

impl EngineScript {
    pub fn set_behavior(&self, url: &str, behavior: PrepareBehavior) {
        self.behaviors.lock().insert(url.to_string(), behavior);
    }

    fn behavior(&self, url: &str) -> PrepareBehavior {
        self.behaviors
            .lock()
            .get(url)
            .copied()
            .unwrap_or(PrepareBehavior::Ready)
    }

    pub fn set_position(&self, position: Duration, duration: Option<Duration>) {
        let mut log = self.log.lock();
        log.position = position;
        log.duration = duration;
    }

    pub fn loaded_urls(&self) -> Vec<String> {
        self.log.lock().loaded.iter().map(|(url, _)| url.clone()).collect()
    }
}

pub struct FakeEngine {
    script: EngineScript,
    events: EngineEventSender,
}

impl FakeEngine {
    fn emit_prepare(&self) {
        let url = {
            let log = self.script.log.lock();
            log.current.and_then(|index| log.queue.get(index).cloned())
        };
        let Some(url) = url else {
            return;
        };

        self.events
            .send(EngineEvent::StateChanged(EngineState::Buffering));
        match self.script.behavior(&url) {
            PrepareBehavior::Ready => {
                self.events.send(EngineEvent::StateChanged(EngineState::Ready));
            }
            PrepareBehavior::Fail(code) => {
                self.events
                    .send(EngineEvent::Error(EngineError::new(code, format!("failed: {}", url))));
            }
            PrepareBehavior::Hang => {}
        }
    }
}

impl MediaEngine for FakeEngine {
    fn set_source(&mut self, source: MediaSource) -> BridgeResult<()> {
        let mut log = self.script.log.lock();
        log.loaded.push((source.url.clone(), source.source_type));
        log.queue = vec![source.url];
        log.current = Some(0);
        log.position = Duration::ZERO;
        Ok(())
    }

    fn add_source(&mut self, source: MediaSource) -> BridgeResult<()> {
        self.script.log.lock().queue.push(source.url);
        Ok(())
    }

    fn remove_item(&mut self, index: usize) -> BridgeResult<()> {
        let mut log = self.script.log.lock();
        if index >= log.queue.len() {
            return Err(BridgeError::OperationFailed("index out of range".into()));
        }
        log.queue.remove(index);
        if let Some(current) = log.current {
            if index < current {
                log.current = Some(current - 1);
            }
        }
        Ok(())
    }

    fn clear_items(&mut self) -> BridgeResult<()> {
        let mut log = self.script.log.lock();
        log.queue.clear();
        log.current = None;
        Ok(())
    }

    fn seek_to_item(&mut self, index: usize) -> BridgeResult<()> {
        {
            let mut log = self.script.log.lock();
            log.seeks.push(index);
            log.current = Some(index);
            log.position = Duration::ZERO;
        }
        self.emit_prepare();
        Ok(())
    }

    fn current_item_index(&self) -> Option<usize> {
        self.script.log.lock().current
    }

    fn item_count(&self) -> usize {
        self.script.log.lock().queue.len()
    }

    fn prepare(&mut self) -> BridgeResult<()> {
        self.script.log.lock().prepares += 1;
        self.emit_prepare();
        Ok(())
    }

    fn set_play_when_ready(&mut self, play_when_ready: bool) -> BridgeResult<()> {
        self.script.log.lock().play_when_ready = play_when_ready;
        Ok(())
    }

    fn stop(&mut self) -> BridgeResult<()> {
        self.script.log.lock().play_when_ready = false;
        Ok(())
    }

    fn set_track_selection(&mut self, selection: TrackSelection) -> BridgeResult<()> {
        self.script.log.lock().track_selections.push(selection);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> BridgeResult<()> {
        self.script.log.lock().volumes.push(volume);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.script.log.lock().position
    }

    fn duration(&self) -> Option<Duration> {
        self.script.log.lock().duration
    }

    fn release(&mut self) {
        self.script.log.lock().released = true;
    }
}

#[derive(Clone, Default)]
pub struct FakeEngineFactory {
    pub script: EngineScript,
    pub configs: Arc<Mutex<Vec<EngineConfig>>>,
}

impl FakeEngineFactory {
    pub fn created(&self) -> usize {
        self.configs.lock().len()
    }

    pub fn last_config(&self) -> Option<EngineConfig> {
        self.configs.lock().last().cloned()
    }
}

impl MediaEngineFactory for FakeEngineFactory {
    fn create(
        &self,
        config: EngineConfig,
        events: EngineEventSender,
    ) -> BridgeResult<Box<dyn MediaEngine>> {
        self.configs.lock().push(config);
        Ok(Box::new(FakeEngine {
            script: self.script.clone(),
            events,
        }))
    }
}

// ============================================================================
// Network monitor
// ============================================================================

pub struct FakeNetworkMonitor {
    info: Mutex<Option<NetworkInfo>>,
    changes_tx: mpsc::UnboundedSender<NetworkInfo>,
    changes_rx: Mutex<Option<mpsc::UnboundedReceiver<NetworkInfo>>>,
}

impl FakeNetworkMonitor {
    /// `None` makes every read fail.
    pub fn new(info: Option<NetworkInfo>) -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        Self {
            info: Mutex::new(info),
            changes_tx,
            changes_rx: Mutex::new(Some(changes_rx)),
        }
    }

    pub fn set(&self, info: NetworkInfo) {
        *self.info.lock() = Some(info);
    }

    /// Update the current info and notify subscribers.
    pub fn push_change(&self, info: NetworkInfo) {
        self.set(info.clone());
        let _ = self.changes_tx.send(info);
    }
}

#[async_trait]
impl NetworkMonitor for FakeNetworkMonitor {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        self.info
            .lock()
            .clone()
            .ok_or_else(|| BridgeError::PermissionDenied("ACCESS_NETWORK_STATE".into()))
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        let rx = self
            .changes_rx
            .lock()
            .take()
            .ok_or_else(|| BridgeError::NotAvailable("already subscribed".into()))?;
        Ok(Box::new(FakeNetworkChanges { rx }))
    }
}

struct FakeNetworkChanges {
    rx: mpsc::UnboundedReceiver<NetworkInfo>,
}

#[async_trait]
impl NetworkChangeStream for FakeNetworkChanges {
    async fn next(&mut self) -> Option<NetworkInfo> {
        self.rx.recv().await
    }
}

// ============================================================================
// Lifecycle observer
// ============================================================================

/// Screen visibility the test flips by hand.
pub struct FakeLifecycleObserver {
    state: Mutex<LifecycleState>,
    changes_tx: mpsc::UnboundedSender<LifecycleState>,
    changes_rx: Mutex<Option<mpsc::UnboundedReceiver<LifecycleState>>>,
}

impl FakeLifecycleObserver {
    pub fn new(state: LifecycleState) -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(state),
            changes_tx,
            changes_rx: Mutex::new(Some(changes_rx)),
        }
    }

    pub fn transition(&self, state: LifecycleState) {
        *self.state.lock() = state;
        let _ = self.changes_tx.send(state);
    }
}

#[async_trait]
impl LifecycleObserver for FakeLifecycleObserver {
    async fn get_state(&self) -> BridgeResult<LifecycleState> {
        Ok(*self.state.lock())
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
        let rx = self
            .changes_rx
            .lock()
            .take()
            .ok_or_else(|| BridgeError::NotAvailable("already subscribed".into()))?;
        Ok(Box::new(FakeLifecycleChanges { rx }))
    }
}

struct FakeLifecycleChanges {
    rx: mpsc::UnboundedReceiver<LifecycleState>,
}

#[async_trait]
impl LifecycleChangeStream for FakeLifecycleChanges {
    async fn next(&mut self) -> Option<LifecycleState> {
        self.rx.recv().await
    }
}

// ============================================================================
// Sleeper
// ============================================================================

/// Records every backoff, then sleeps on the (paused) tokio clock.
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// HTTP client
// ============================================================================

/// Serves a fixed body for every URL and records requests.
#[derive(Default)]
pub struct FakeHttpClient {
    pub requests: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpClient for FakeHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().push(request.url.clone());
        Ok(HttpResponse::new(200, format!("media:{}", request.url)))
    }
}

// ============================================================================
// File system
// ============================================================================

/// In-memory file system; `fail_dirs` makes directory creation fail.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Bytes>>,
    dirs: Mutex<Vec<PathBuf>>,
    pub fail_dirs: Mutex<bool>,
    pub fail_writes: Mutex<bool>,
}

impl MemoryFileSystem {
    pub fn failing() -> Self {
        let fs = Self::default();
        *fs.fail_dirs.lock() = true;
        fs
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        if *self.fail_dirs.lock() {
            return Err(BridgeError::PermissionDenied(format!(
                "read-only file system: {:?}",
                path
            )));
        }
        self.dirs.lock().push(path.to_path_buf());
        Ok(())
    }

    async fn list_files(&self, dir: &Path) -> BridgeResult<Vec<FileEntry>> {
        Ok(self
            .files
            .lock()
            .iter()
            .filter(|(file, _)| file.parent() == Some(dir))
            .map(|(file, data)| FileEntry {
                path: file.clone(),
                size: data.len() as u64,
                modified_at: None,
            })
            .collect())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("{:?} not found", path)))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        if *self.fail_writes.lock() {
            return Err(BridgeError::OperationFailed(format!("disk full: {:?}", path)));
        }
        self.files.lock().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> BridgeResult<()> {
        self.files.lock().remove(path);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub manager: Arc<PlaybackManager>,
    pub engines: FakeEngineFactory,
    pub network: Arc<FakeNetworkMonitor>,
    pub sleeper: Arc<RecordingSleeper>,
    pub http: Arc<FakeHttpClient>,
    pub fs: Arc<MemoryFileSystem>,
}

impl Harness {
    pub fn script(&self) -> &EngineScript {
        &self.engines.script
    }
}

pub fn harness(network: Option<NetworkInfo>) -> Harness {
    harness_with(network, PlaybackConfig::default(), MemoryFileSystem::default())
}

pub fn harness_with(
    network: Option<NetworkInfo>,
    config: PlaybackConfig,
    fs: MemoryFileSystem,
) -> Harness {
    let engines = FakeEngineFactory::default();
    let network = Arc::new(FakeNetworkMonitor::new(network));
    let sleeper = Arc::new(RecordingSleeper::default());
    let http = Arc::new(FakeHttpClient::default());
    let fs = Arc::new(fs);

    let core = CoreConfig::builder()
        .cache_dir("/mem/cache")
        .cache_size_mb(16)
        .engine_factory(Arc::new(engines.clone()))
        .http_client(http.clone())
        .file_system(fs.clone())
        .network_monitor(network.clone())
        .sleeper(sleeper.clone())
        .build()
        .expect("core config");

    let manager = Arc::new(PlaybackManager::new(core, config).expect("playback manager"));

    Harness {
        manager,
        engines,
        network,
        sleeper,
        http,
        fs,
    }
}
