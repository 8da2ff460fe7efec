//! # Engine Dispatcher
//!
//! The media engine is not safe for concurrent use, so exactly one task owns
//! it. Everything else talks to that task through [`DispatcherHandle`]:
//! commands are applied strictly in arrival order and each carries a oneshot
//! reply channel.
//!
//! The same task consumes the engine's event channel. Every event is stamped
//! with the source generation it was emitted under; events from a replaced
//! source are dropped. After each command and event a fresh
//! [`SessionSnapshot`] is published on a `watch` channel.
//!
//! Load and seek commands carry the id of the `play()` request that issued
//! them. A command whose id is older than the newest request is rejected
//! with [`PlaybackError::Superseded`] without touching the engine.

use crate::error::{PlaybackError, Result};
use crate::network::BitrateTier;
use crate::session::{SessionSnapshot, SessionState};
use bridge_traits::error::BridgeError;
use bridge_traits::playback::{
    EngineError, EngineErrorCode, EngineEvent, EngineEventSender, EngineState, MediaEngine,
    MediaSource, StampedEvent, TrackSelection,
};
use core_runtime::events::{EventHub, PlaybackEvent};
use core_runtime::logging::{redact_url, redact_urls_in};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// Pending commands before senders wait.
const COMMAND_BUFFER_SIZE: usize = 32;

/// Commands applied to the engine by the dispatcher task.
#[derive(Debug)]
pub enum EngineCommand {
    /// Replace the queue with `source`, prepare it and start playing.
    /// Replies with the new source generation.
    Load {
        request_id: u64,
        source: MediaSource,
        respond_to: oneshot::Sender<Result<u64>>,
    },
    /// Jump to an already-queued item and start playing.
    /// Replies with the new source generation.
    SeekToQueued {
        request_id: u64,
        index: usize,
        respond_to: oneshot::Sender<Result<u64>>,
    },
    SetPlayWhenReady {
        play_when_ready: bool,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// Append `source` to the queue. Replies with its index.
    Enqueue {
        source: MediaSource,
        respond_to: oneshot::Sender<Result<usize>>,
    },
    /// Remove queue items. The current item is never removed.
    RemoveItems {
        indices: Vec<usize>,
        respond_to: oneshot::Sender<Result<()>>,
    },
    SetTrackSelection {
        tier: BitrateTier,
        selection: TrackSelection,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// Apply volume; a muted session outputs silence but keeps `volume`.
    SetVolume {
        volume: f32,
        muted: bool,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// Refresh position and duration from the engine.
    Query {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
    /// Stop, clear the queue and release the engine. Ends the task.
    Release { respond_to: oneshot::Sender<()> },
}

/// Inputs for a new dispatcher task.
pub struct DispatcherParts {
    pub engine: Box<dyn MediaEngine>,
    pub event_sender: EngineEventSender,
    pub engine_events: mpsc::UnboundedReceiver<StampedEvent>,
    pub hub: Arc<EventHub>,
    /// Newest `play()` request id, shared with the manager.
    pub latest_request: Arc<AtomicU64>,
    pub repeat_one: bool,
    pub tier: BitrateTier,
    pub volume: f32,
    pub muted: bool,
}

struct Dispatcher {
    engine: Box<dyn MediaEngine>,
    event_sender: EngineEventSender,
    engine_events: mpsc::UnboundedReceiver<StampedEvent>,
    commands: mpsc::Receiver<EngineCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
    hub: Arc<EventHub>,
    latest_request: Arc<AtomicU64>,
    repeat_one: bool,
    session: SessionSnapshot,
    released: bool,
}

/// Start the dispatcher task that owns `parts.engine`.
pub fn spawn_dispatcher(parts: DispatcherParts) -> DispatcherHandle {
    let session_id = Uuid::new_v4();
    let session = SessionSnapshot {
        session_id: Some(session_id),
        volume: parts.volume,
        muted: parts.muted,
        tier: Some(parts.tier),
        generation: parts.event_sender.generation(),
        ..SessionSnapshot::default()
    };

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.clone());

    let dispatcher = Dispatcher {
        engine: parts.engine,
        event_sender: parts.event_sender,
        engine_events: parts.engine_events,
        commands: command_rx,
        snapshots: snapshot_tx,
        hub: parts.hub,
        latest_request: parts.latest_request,
        repeat_one: parts.repeat_one,
        session,
        released: false,
    };

    let task = tokio::spawn(
        dispatcher
            .run()
            .instrument(info_span!("playback_session", %session_id)),
    );

    DispatcherHandle {
        session_id,
        commands: command_tx,
        snapshots: snapshot_rx,
        task: Arc::new(parking_lot::Mutex::new(Some(task))),
    }
}

impl Dispatcher {
    async fn run(mut self) {
        info!("Engine dispatcher started");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("All dispatcher handles dropped");
                        break;
                    };
                    if self.handle_command(command) {
                        break;
                    }
                }

                Some(stamped) = self.engine_events.recv() => {
                    self.handle_engine_event(stamped);
                }
            }
        }

        if !self.released {
            self.release_engine();
        }
        info!("Engine dispatcher stopped");
    }

    /// Returns `true` when the task should stop.
    ///
    /// The snapshot is published before replying so a caller that awaits
    /// the reply never observes an older snapshot.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        trace!(command = ?std::mem::discriminant(&command), "Dispatching engine command");

        match command {
            EngineCommand::Load {
                request_id,
                source,
                respond_to,
            } => {
                let result = self
                    .check_current(request_id)
                    .and_then(|_| self.load(source));
                self.publish();
                let _ = respond_to.send(result);
            }
            EngineCommand::SeekToQueued {
                request_id,
                index,
                respond_to,
            } => {
                let result = self
                    .check_current(request_id)
                    .and_then(|_| self.seek_to_queued(index));
                self.publish();
                let _ = respond_to.send(result);
            }
            EngineCommand::SetPlayWhenReady {
                play_when_ready,
                respond_to,
            } => {
                let result = engine_call(self.engine.set_play_when_ready(play_when_ready));
                if result.is_ok() {
                    self.session.play_when_ready = play_when_ready;
                }
                self.publish();
                let _ = respond_to.send(result);
            }
            EngineCommand::Enqueue { source, respond_to } => {
                let result = self.enqueue(source);
                self.publish();
                let _ = respond_to.send(result);
            }
            EngineCommand::RemoveItems {
                indices,
                respond_to,
            } => {
                let result = self.remove_items(indices);
                self.publish();
                let _ = respond_to.send(result);
            }
            EngineCommand::SetTrackSelection {
                tier,
                selection,
                respond_to,
            } => {
                let result = engine_call(self.engine.set_track_selection(selection));
                if result.is_ok() {
                    debug!(?tier, max_bps = selection.max_video_bitrate_bps, "Track selection updated");
                    self.session.tier = Some(tier);
                }
                self.publish();
                let _ = respond_to.send(result);
            }
            EngineCommand::SetVolume {
                volume,
                muted,
                respond_to,
            } => {
                let output = if muted { 0.0 } else { volume };
                let result = engine_call(self.engine.set_volume(output));
                if result.is_ok() {
                    self.session.volume = volume;
                    self.session.muted = muted;
                }
                self.publish();
                let _ = respond_to.send(result);
            }
            EngineCommand::Query { respond_to } => {
                self.publish();
                let _ = respond_to.send(self.session.clone());
            }
            EngineCommand::Release { respond_to } => {
                self.release_engine();
                let _ = respond_to.send(());
                return true;
            }
        }

        false
    }

    fn check_current(&self, request_id: u64) -> Result<()> {
        let latest = self.latest_request.load(Ordering::SeqCst);
        if request_id < latest {
            debug!(request_id, latest, "Dropping stale playback command");
            return Err(PlaybackError::Superseded);
        }
        Ok(())
    }

    fn load(&mut self, source: MediaSource) -> Result<u64> {
        let generation = self.event_sender.advance_generation();
        let url = source.url.clone();
        info!(
            url = %redact_url(&url),
            source_type = ?source.source_type,
            generation,
            "Loading new source"
        );

        self.session.generation = generation;
        self.session.error = None;
        self.session.url = Some(url.clone());
        self.session.queue = vec![url];
        self.session.current_index = Some(0);
        self.session.state = SessionState::Buffering;

        if let Err(e) = self.start_current(source) {
            self.session.state = SessionState::Error;
            return Err(e);
        }
        Ok(generation)
    }

    fn start_current(&mut self, source: MediaSource) -> Result<()> {
        engine_call(self.engine.set_source(source))?;
        engine_call(self.engine.prepare())?;
        engine_call(self.engine.set_play_when_ready(true))?;
        self.session.play_when_ready = true;
        Ok(())
    }

    fn seek_to_queued(&mut self, index: usize) -> Result<u64> {
        let Some(url) = self.session.queue.get(index).cloned() else {
            return Err(PlaybackError::Internal(format!(
                "queue index {} out of range ({} items)",
                index,
                self.session.queue.len()
            )));
        };

        let generation = self.event_sender.advance_generation();
        info!(url = %redact_url(&url), index, generation, "Jumping to preloaded item");

        let needs_prepare = matches!(self.session.state, SessionState::Idle | SessionState::Error);
        self.session.generation = generation;
        self.session.error = None;
        self.session.url = Some(url);
        self.session.current_index = Some(index);
        self.session.state = SessionState::Buffering;

        engine_call(self.engine.seek_to_item(index))?;
        if needs_prepare {
            engine_call(self.engine.prepare())?;
        }
        engine_call(self.engine.set_play_when_ready(true))?;
        self.session.play_when_ready = true;
        Ok(generation)
    }

    fn enqueue(&mut self, source: MediaSource) -> Result<usize> {
        let url = source.url.clone();
        engine_call(self.engine.add_source(source))?;
        self.session.queue.push(url);
        let index = self.session.queue.len() - 1;
        debug!(index, queue_len = self.session.queue.len(), "Item queued");
        Ok(index)
    }

    fn remove_items(&mut self, mut indices: Vec<usize>) -> Result<()> {
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();

        for index in indices {
            if index >= self.session.queue.len() || Some(index) == self.session.current_index {
                continue;
            }
            engine_call(self.engine.remove_item(index))?;
            self.session.queue.remove(index);
            if let Some(current) = self.session.current_index {
                if index < current {
                    self.session.current_index = Some(current - 1);
                }
            }
            debug!(index, "Queue item evicted");
        }
        Ok(())
    }

    fn handle_engine_event(&mut self, stamped: StampedEvent) {
        if stamped.generation != self.session.generation {
            trace!(
                event_generation = stamped.generation,
                current = self.session.generation,
                "Ignoring event from replaced source"
            );
            return;
        }

        match stamped.event {
            EngineEvent::StateChanged(state) => self.on_state_changed(state),
            EngineEvent::ItemTransition { index } => {
                self.session.current_index = Some(index);
                self.session.url = self.session.queue.get(index).cloned();
                debug!(index, "Engine moved to another item");
            }
            EngineEvent::Error(error) => self.on_engine_error(error),
        }

        self.publish();
    }

    fn on_state_changed(&mut self, state: EngineState) {
        let previous = self.session.state;
        let next = SessionState::from(state);
        if previous == next {
            return;
        }

        self.session.state = next;
        if next == SessionState::Ready {
            self.session.error = None;
        }
        debug!(?previous, ?next, "Engine state changed");

        let Some(url) = self.session.url.as_deref().map(redact_url) else {
            return;
        };
        match next {
            SessionState::Buffering => {
                self.hub.emit(PlaybackEvent::Buffering { url });
            }
            SessionState::Ready => {
                self.hub.emit(PlaybackEvent::Ready { url });
            }
            SessionState::Ended if !self.repeat_one => {
                self.hub.emit(PlaybackEvent::Ended { url });
            }
            _ => {}
        }
    }

    fn on_engine_error(&mut self, engine_error: EngineError) {
        let url = self.session.url.as_deref().map(redact_url);
        let error = PlaybackError::from(engine_error.clone());

        match engine_error.code {
            EngineErrorCode::PermissionDenied => {
                error!(?url, message = %redact_urls_in(&engine_error.message), "Playback failed: permission denied")
            }
            EngineErrorCode::NotFound => {
                error!(?url, message = %redact_urls_in(&engine_error.message), "Playback failed: media not found")
            }
            EngineErrorCode::Decode => {
                error!(?url, message = %redact_urls_in(&engine_error.message), "Playback failed: decode failure")
            }
            EngineErrorCode::HttpStatus(status) => {
                warn!(?url, status, class = ?error.class(), "Playback failed: bad HTTP status")
            }
            EngineErrorCode::Network | EngineErrorCode::Timeout => {
                warn!(?url, code = ?engine_error.code, message = %redact_urls_in(&engine_error.message), "Playback interrupted by network")
            }
            EngineErrorCode::Unknown => {
                warn!(?url, message = %redact_urls_in(&engine_error.message), "Playback failed: unknown engine error")
            }
        }

        self.session.state = SessionState::Error;
        self.session.error = Some(engine_error);
    }

    fn release_engine(&mut self) {
        if let Err(e) = self.engine.stop() {
            warn!(error = %e, "Engine stop failed during release");
        }
        if let Err(e) = self.engine.clear_items() {
            warn!(error = %e, "Engine clear failed during release");
        }
        self.engine.release();
        self.released = true;

        self.session = SessionSnapshot {
            generation: self.event_sender.advance_generation(),
            ..SessionSnapshot::default()
        };
        self.snapshots.send_replace(self.session.clone());
        info!("Engine released");
    }

    fn publish(&mut self) {
        self.session.position = self.engine.position();
        self.session.duration = self.engine.duration();
        if let Some(index) = self.engine.current_item_index() {
            self.session.current_index = Some(index);
        }
        self.snapshots.send_replace(self.session.clone());
    }
}

fn engine_call<T>(result: std::result::Result<T, BridgeError>) -> Result<T> {
    result.map_err(|e| PlaybackError::EngineCommand(e.to_string()))
}

/// Cloneable handle to the dispatcher task.
#[derive(Clone)]
pub struct DispatcherHandle {
    session_id: Uuid,
    commands: mpsc::Sender<EngineCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,
}

impl DispatcherHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Send a command built around a fresh reply channel and wait for the reply.
    pub async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.commands
            .send(build(respond_to))
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        response.await.map_err(|_| PlaybackError::SessionClosed)
    }

    pub async fn load(&self, request_id: u64, source: MediaSource) -> Result<u64> {
        self.request(|respond_to| EngineCommand::Load {
            request_id,
            source,
            respond_to,
        })
        .await?
    }

    pub async fn seek_to_queued(&self, request_id: u64, index: usize) -> Result<u64> {
        self.request(|respond_to| EngineCommand::SeekToQueued {
            request_id,
            index,
            respond_to,
        })
        .await?
    }

    pub async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<()> {
        self.request(|respond_to| EngineCommand::SetPlayWhenReady {
            play_when_ready,
            respond_to,
        })
        .await?
    }

    pub async fn enqueue(&self, source: MediaSource) -> Result<usize> {
        self.request(|respond_to| EngineCommand::Enqueue { source, respond_to })
            .await?
    }

    pub async fn remove_items(&self, indices: Vec<usize>) -> Result<()> {
        self.request(|respond_to| EngineCommand::RemoveItems {
            indices,
            respond_to,
        })
        .await?
    }

    pub async fn set_track_selection(
        &self,
        tier: BitrateTier,
        selection: TrackSelection,
    ) -> Result<()> {
        self.request(|respond_to| EngineCommand::SetTrackSelection {
            tier,
            selection,
            respond_to,
        })
        .await?
    }

    pub async fn set_volume(&self, volume: f32, muted: bool) -> Result<()> {
        self.request(|respond_to| EngineCommand::SetVolume {
            volume,
            muted,
            respond_to,
        })
        .await?
    }

    /// Snapshot with position and duration read from the engine.
    pub async fn query(&self) -> Result<SessionSnapshot> {
        self.request(|respond_to| EngineCommand::Query { respond_to })
            .await
    }

    /// Release the engine and wait for the task to finish.
    pub async fn release(&self) {
        if self
            .request(|respond_to| EngineCommand::Release { respond_to })
            .await
            .is_err()
        {
            debug!("Dispatcher already stopped");
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Dispatcher task ended abnormally");
            }
        }
    }

    /// Last published snapshot, without a round trip.
    pub fn current(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}
