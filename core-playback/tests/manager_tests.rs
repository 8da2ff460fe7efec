//! Playback manager behavior against scripted host bridges.
//!
//! Every test runs on a paused tokio clock, so backoff sleeps and prepare
//! timeouts complete instantly.

mod common;

use bridge_traits::background::LifecycleState;
use bridge_traits::network::{NetworkInfo, NetworkType};
use bridge_traits::playback::{EngineErrorCode, SourceType, TrackSelection};
use common::{harness, harness_with, FakeLifecycleObserver, MemoryFileSystem, PrepareBehavior};
use core_playback::{
    BitrateTier, ManagerState, PlayOutcome, PlaybackConfig, PlaybackError, PreloadConfig,
    PreloadOutcome, RetryConfig, SessionState,
};
use core_runtime::events::{ErrorKind, EventStream, PlaybackEvent};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn clip(n: usize) -> String {
    format!("https://cdn.example.com/reels/{}.mp4", n)
}

fn wifi() -> Option<NetworkInfo> {
    Some(NetworkInfo::connected(NetworkType::WiFi))
}

fn cellular() -> Option<NetworkInfo> {
    Some(NetworkInfo::connected(NetworkType::Cellular))
}

fn drain(events: &mut EventStream) -> Vec<PlaybackEvent> {
    let mut out = Vec::new();
    while let Some(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// play()
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_play_prepares_clip() {
    let h = harness(wifi());
    let mut events = h.manager.events().unwrap();

    assert_eq!(h.manager.play(&clip(1)).await, PlayOutcome::Ready);

    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.url, Some(clip(1)));
    assert_eq!(snapshot.state, SessionState::Ready);
    assert!(snapshot.play_when_ready);
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Ready);
    assert_eq!(h.engines.created(), 1);

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Ready { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_last_request_wins() {
    let h = harness(wifi());

    let (url1, url2) = (clip(1), clip(2));
    let (first, second) = tokio::join!(h.manager.play(&url1), h.manager.play(&url2));

    assert_eq!(first, PlayOutcome::Superseded);
    assert_eq!(second, PlayOutcome::Ready);
    assert_eq!(h.manager.snapshot().await.url, Some(clip(2)));
    assert_eq!(h.script().loaded_urls(), vec![clip(2)]);
    assert_eq!(h.engines.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_replaying_current_clip_is_idempotent() {
    let h = harness(wifi());

    assert!(h.manager.play(&clip(1)).await.is_ready());
    assert!(h.manager.play(&clip(1)).await.is_ready());

    let log = h.script().log.lock();
    assert_eq!(log.loaded.len(), 1);
    assert_eq!(log.prepares, 1);
    assert!(log.play_when_ready);
}

#[tokio::test(start_paused = true)]
async fn test_new_clip_replaces_queue() {
    let h = harness(wifi());

    assert!(h.manager.play(&clip(1)).await.is_ready());
    assert!(h.manager.play(&clip(2)).await.is_ready());

    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.queue, vec![clip(2)]);
    assert_eq!(h.script().loaded_urls(), vec![clip(1), clip(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_hls_on_cellular_uses_low_ceiling() {
    let h = harness(cellular());
    let url = "https://cdn.example.com/reels/7/master.M3U8?token=abc";

    assert!(h.manager.play(url).await.is_ready());

    let config = h.engines.last_config().unwrap();
    assert_eq!(config.track_selection.max_video_bitrate_bps, 1_200_000);
    assert!(config.repeat_one);
    assert_eq!(h.script().log.lock().loaded[0].1, SourceType::Hls);
    assert_eq!(h.manager.current_tier().await, Some(BitrateTier::Low));
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_network_uses_minimal_ceiling() {
    let h = harness(None);

    assert!(h.manager.play("https://cdn.example.com/a.mpd").await.is_ready());

    let config = h.engines.last_config().unwrap();
    assert_eq!(config.track_selection.max_video_bitrate_bps, 500_000);
    assert_eq!(h.script().log.lock().loaded[0].1, SourceType::Dash);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_backs_off_then_gives_up() {
    let h = harness(wifi());
    let mut events = h.manager.events().unwrap();
    h.script()
        .set_behavior(&clip(1), PrepareBehavior::Fail(EngineErrorCode::Network));

    let outcome = h.manager.play(&clip(1)).await;

    assert!(matches!(outcome, PlayOutcome::Failed(PlaybackError::Network(_))));
    assert_eq!(
        h.sleeper.recorded(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );

    let log = h.script().log.lock();
    assert_eq!(log.loaded.len(), 4);
    // Only the final retry drops to the minimal tier
    assert_eq!(
        log.track_selections,
        vec![TrackSelection {
            max_video_bitrate_bps: 500_000
        }]
    );
    drop(log);

    let events = drain(&mut events);
    let retries: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::Retrying { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1, 2, 3]);
    assert!(events.iter().any(|e| matches!(
        e,
        PlaybackEvent::Error {
            kind: ErrorKind::Network,
            retryable: true,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_without_retries_is_retryable() {
    let config = PlaybackConfig::default().with_retry(RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    });
    let h = harness_with(wifi(), config, MemoryFileSystem::default());
    h.script()
        .set_behavior(&clip(1), PrepareBehavior::Fail(EngineErrorCode::Timeout));

    let outcome = h.manager.play(&clip(1)).await;

    assert!(matches!(outcome, PlayOutcome::Retryable(PlaybackError::Timeout(_))));
    assert!(h.sleeper.recorded().is_empty());
    assert_eq!(h.script().log.lock().loaded.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_event_hides_signed_query() {
    let h = harness(wifi());
    let mut events = h.manager.events().unwrap();
    let url = "https://cdn.example.com/reels/3.mp4?Signature=s3cret&Expires=99";
    h.script().set_behavior(url, PrepareBehavior::Fail(EngineErrorCode::Decode));

    assert!(matches!(h.manager.play(url).await, PlayOutcome::Failed(_)));

    let message = drain(&mut events)
        .into_iter()
        .find_map(|e| match e {
            PlaybackEvent::Error { message, .. } => Some(message),
            _ => None,
        })
        .unwrap();
    assert!(message.contains("https://cdn.example.com/reels/3.mp4?Signature=[REDACTED]"));
    assert!(!message.contains("s3cret"));
    assert!(!message.contains("99"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers_on_retry() {
    let h = harness(wifi());
    h.script()
        .set_behavior(&clip(1), PrepareBehavior::Fail(EngineErrorCode::HttpStatus(503)));

    let manager = h.manager.clone();
    let script = h.script().clone();
    let play = tokio::spawn(async move { manager.play(&clip(1)).await });

    // Let the first attempt fail, then heal the clip before the retry
    tokio::time::sleep(Duration::from_millis(500)).await;
    script.set_behavior(&clip(1), PrepareBehavior::Ready);

    assert_eq!(play.await.unwrap(), PlayOutcome::Ready);
    assert_eq!(h.sleeper.recorded(), vec![Duration::from_secs(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failures_are_not_retried() {
    let cases: [(EngineErrorCode, fn(&PlaybackError) -> bool); 3] = [
        (EngineErrorCode::Decode, |e| matches!(e, PlaybackError::Decode(_))),
        (EngineErrorCode::HttpStatus(403), |e| {
            matches!(e, PlaybackError::PermissionDenied(_))
        }),
        (EngineErrorCode::NotFound, |e| matches!(e, PlaybackError::NotFound(_))),
    ];

    for (code, expected) in cases {
        let h = harness(wifi());
        h.script().set_behavior(&clip(1), PrepareBehavior::Fail(code));

        let outcome = h.manager.play(&clip(1)).await;
        match &outcome {
            PlayOutcome::Failed(error) => assert!(expected(error), "{:?}: got {:?}", code, error),
            other => panic!("{:?}: expected failure, got {:?}", code, other),
        }

        assert!(h.sleeper.recorded().is_empty());
        assert_eq!(h.script().log.lock().loaded.len(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_prepare_timeout_is_transient() {
    let config = PlaybackConfig::default().with_prepare_timeout(Duration::from_secs(2));
    let h = harness_with(wifi(), config, MemoryFileSystem::default());
    h.script().set_behavior(&clip(1), PrepareBehavior::Hang);

    let outcome = h.manager.play(&clip(1)).await;

    assert!(matches!(outcome, PlayOutcome::Failed(PlaybackError::Timeout(_))));
    assert_eq!(h.sleeper.recorded().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_release_supersedes_pending_play() {
    let h = harness(wifi());
    h.script().set_behavior(&clip(1), PrepareBehavior::Hang);

    let manager = h.manager.clone();
    let play = tokio::spawn(async move { manager.play(&clip(1)).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    h.manager.release().await;

    assert_eq!(play.await.unwrap(), PlayOutcome::Superseded);
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Uninitialized);
}

// ============================================================================
// Cache setup
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cache_unavailable_fails_playback() {
    let h = harness_with(wifi(), PlaybackConfig::default(), MemoryFileSystem::failing());

    for _ in 0..2 {
        let outcome = h.manager.play(&clip(1)).await;
        assert!(matches!(
            outcome,
            PlayOutcome::Failed(PlaybackError::CacheUnavailable(_))
        ));
    }
    assert_eq!(h.engines.created(), 0);
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Uninitialized);

    // Explicit setup retries once storage is writable again
    *h.fs.fail_dirs.lock() = false;
    h.manager.ensure_cache(Path::new("/mem/cache")).await.unwrap();
    assert!(h.manager.play(&clip(1)).await.is_ready());
}

// ============================================================================
// preload()
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_preload_without_session() {
    let h = harness(wifi());
    assert_eq!(h.manager.preload(&clip(2)).await, PreloadOutcome::NoSession);
}

#[tokio::test(start_paused = true)]
async fn test_preload_queues_and_warms_cache() {
    let h = harness(wifi());
    assert!(h.manager.play(&clip(1)).await.is_ready());

    assert_eq!(
        h.manager.preload(&clip(2)).await,
        PreloadOutcome::Queued {
            index: 1,
            cache_warmed: true
        }
    );
    assert_eq!(h.http.requests.lock().clone(), vec![clip(2)]);
    assert_eq!(h.fs.file_count(), 1);

    assert_eq!(h.manager.preload(&clip(2)).await, PreloadOutcome::AlreadyQueued);
    assert_eq!(h.manager.preload(&clip(3)).await, PreloadOutcome::SkippedQueueFull);
}

#[tokio::test(start_paused = true)]
async fn test_playing_preloaded_clip_seeks() {
    let h = harness(wifi());
    assert!(h.manager.play(&clip(1)).await.is_ready());
    assert!(h.manager.preload(&clip(2)).await.is_queued());

    assert!(h.manager.play(&clip(2)).await.is_ready());

    let log = h.script().log.lock();
    assert_eq!(log.loaded.len(), 1);
    assert_eq!(log.seeks, vec![1]);
    drop(log);

    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.url, Some(clip(2)));
    assert_eq!(snapshot.current_index, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_preload_window_stays_bounded() {
    let h = harness(wifi());
    assert!(h.manager.play(&clip(0)).await.is_ready());

    for n in 1..6 {
        assert!(h.manager.preload(&clip(n)).await.is_queued(), "clip {}", n);
        assert!(h.manager.play(&clip(n)).await.is_ready(), "clip {}", n);

        let snapshot = h.manager.snapshot().await;
        // One behind, the current clip, nothing ahead yet
        assert!(snapshot.queue.len() <= 3, "queue {:?}", snapshot.queue);
        assert_eq!(snapshot.url, Some(clip(n)));
    }

    assert!(h.manager.preload(&clip(6)).await.is_queued());
    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.queue, vec![clip(4), clip(5), clip(6)]);
    assert_eq!(snapshot.current_index, Some(1));
    assert_eq!(h.script().log.lock().queue, snapshot.queue);
}

#[tokio::test(start_paused = true)]
async fn test_preload_respects_throughput_floor() {
    let slow = NetworkInfo::connected(NetworkType::WiFi).with_downstream_kbps(100);
    let h = harness(Some(slow));
    assert!(h.manager.play(&clip(1)).await.is_ready());

    assert_eq!(
        h.manager.preload(&clip(2)).await,
        PreloadOutcome::SkippedSlowNetwork
    );

    h.network
        .set(NetworkInfo::connected(NetworkType::Cellular).with_downstream_kbps(150));
    assert!(h.manager.preload(&clip(2)).await.is_queued());
}

#[tokio::test(start_paused = true)]
async fn test_preload_on_unmeasured_cellular_is_skipped() {
    let h = harness(cellular());
    assert!(h.manager.play(&clip(1)).await.is_ready());

    assert_eq!(
        h.manager.preload(&clip(2)).await,
        PreloadOutcome::SkippedSlowNetwork
    );
}

#[tokio::test(start_paused = true)]
async fn test_preload_without_warming() {
    let config = PlaybackConfig::default().with_preload(PreloadConfig {
        warm_cache: false,
        ..PreloadConfig::default()
    });
    let h = harness_with(wifi(), config, MemoryFileSystem::default());
    assert!(h.manager.play(&clip(1)).await.is_ready());

    assert_eq!(
        h.manager.preload(&clip(2)).await,
        PreloadOutcome::Queued {
            index: 1,
            cache_warmed: false
        }
    );
    assert!(h.http.requests.lock().is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_keep_position() {
    let h = harness(wifi());
    let mut events = h.manager.events().unwrap();
    assert!(h.manager.play(&clip(1)).await.is_ready());
    h.script()
        .set_position(Duration::from_secs(12), Some(Duration::from_secs(30)));

    h.manager.pause().await.unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Paused);
    assert!(!h.script().log.lock().play_when_ready);

    h.manager.resume().await.unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Ready);
    assert!(h.script().log.lock().play_when_ready);
    assert!((h.manager.progress().await - 0.4).abs() < 1e-6);

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Paused { position_ms: 12_000, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Resumed { position_ms: 12_000, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_pause_without_session_is_noop() {
    let h = harness(wifi());
    h.manager.pause().await.unwrap();
    h.manager.resume().await.unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Uninitialized);
    assert_eq!(h.manager.progress().await, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_double_release() {
    let h = harness(wifi());
    let mut events = h.manager.events().unwrap();
    assert!(h.manager.play(&clip(1)).await.is_ready());

    h.manager.release().await;
    h.manager.release().await;

    assert_eq!(h.manager.lifecycle_state(), ManagerState::Uninitialized);
    assert!(h.script().log.lock().released);
    let released = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, PlaybackEvent::Released))
        .count();
    assert_eq!(released, 1);

    // A fresh session after release
    assert!(h.manager.play(&clip(2)).await.is_ready());
    assert_eq!(h.engines.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_transitions() {
    let h = harness(wifi());
    assert!(h.manager.play(&clip(1)).await.is_ready());

    h.manager
        .handle_lifecycle(LifecycleState::Background)
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Paused);

    h.manager
        .handle_lifecycle(LifecycleState::Foreground)
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Ready);

    h.manager
        .handle_lifecycle(LifecycleState::Destroyed)
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Uninitialized);
    assert!(h.script().log.lock().released);
}

#[tokio::test(start_paused = true)]
async fn test_attached_lifecycle_observer_drives_session() {
    let h = harness(wifi());
    assert!(h.manager.play(&clip(1)).await.is_ready());

    let observer = Arc::new(FakeLifecycleObserver::new(LifecycleState::Background));
    h.manager.attach_lifecycle(observer.clone()).await.unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Paused);

    observer.transition(LifecycleState::Foreground);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Ready);

    observer.transition(LifecycleState::Destroyed);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Uninitialized);
}

// ============================================================================
// Network changes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stall_and_recover() {
    let h = harness(wifi());
    let mut events = h.manager.events().unwrap();
    assert!(h.manager.play(&clip(1)).await.is_ready());

    h.manager
        .on_network_change(NetworkInfo::disconnected())
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Stalled);
    assert!(!h.script().log.lock().play_when_ready);

    h.manager
        .on_network_change(NetworkInfo::connected(NetworkType::Cellular))
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Ready);
    assert!(h.script().log.lock().play_when_ready);
    assert_eq!(h.manager.current_tier().await, Some(BitrateTier::Low));

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(e, PlaybackEvent::Stalled { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        PlaybackEvent::Error {
            kind: ErrorKind::Network,
            retryable: true,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(e, PlaybackEvent::Recovered { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_paused_stall_recovers_paused() {
    let h = harness(wifi());
    assert!(h.manager.play(&clip(1)).await.is_ready());
    h.manager.pause().await.unwrap();

    h.manager
        .on_network_change(NetworkInfo::disconnected())
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Stalled);

    h.manager
        .on_network_change(NetworkInfo::connected(NetworkType::WiFi))
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Paused);
    assert!(!h.script().log.lock().play_when_ready);
}

#[tokio::test(start_paused = true)]
async fn test_resume_while_stalled_waits_for_network() {
    let h = harness(wifi());
    assert!(h.manager.play(&clip(1)).await.is_ready());
    h.manager.pause().await.unwrap();
    h.manager
        .on_network_change(NetworkInfo::disconnected())
        .await
        .unwrap();

    h.manager.resume().await.unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Stalled);
    assert!(!h.script().log.lock().play_when_ready);

    h.manager
        .on_network_change(NetworkInfo::connected(NetworkType::WiFi))
        .await
        .unwrap();
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Ready);
    assert!(h.script().log.lock().play_when_ready);
}

#[tokio::test(start_paused = true)]
async fn test_network_watcher_follows_changes() {
    let h = harness(wifi());
    h.manager.start_watchers().await;
    assert!(h.manager.play(&clip(1)).await.is_ready());

    h.network.push_change(NetworkInfo::disconnected());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Stalled);

    h.network
        .push_change(NetworkInfo::connected(NetworkType::WiFi));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.manager.lifecycle_state(), ManagerState::Ready);
}

// ============================================================================
// Controls & events
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_volume_and_mute() {
    let h = harness(wifi());

    assert!(matches!(
        h.manager.set_volume(1.5).await,
        Err(PlaybackError::InvalidVolume(_))
    ));
    h.manager.set_volume(0.5).await.unwrap();
    assert!(h.manager.play(&clip(1)).await.is_ready());
    assert_eq!(h.engines.last_config().unwrap().volume, 0.5);

    h.manager.set_muted(true).await.unwrap();
    assert_eq!(h.script().log.lock().volumes.last(), Some(&0.0));

    let snapshot = h.manager.snapshot().await;
    assert_eq!(snapshot.volume, 0.5);
    assert!(snapshot.muted);

    h.manager.set_muted(false).await.unwrap();
    assert_eq!(h.script().log.lock().volumes.last(), Some(&0.5));
}

#[tokio::test(start_paused = true)]
async fn test_events_have_a_single_subscriber() {
    let h = harness(wifi());
    assert!(h.manager.events().is_ok());
    assert!(h.manager.events().is_err());
}
