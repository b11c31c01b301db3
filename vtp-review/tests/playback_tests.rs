//! Playback synchronizer behavior over a fake audio element

mod helpers;

use helpers::{scored, segment, FakeAudio};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use vtp_common::events::{EventBus, TrackSource, VtpEvent};
use vtp_review::playback::{
    run_position_watch, PendingAction, PlaybackSynchronizer, TrackUrls, CLEAN_FALLBACK_NOTICE,
};

const CLEAN_URL: &str = "http://backend.test/legacy/artifact?path=out%2Fclean.wav";
const ORIGINAL_URL: &str = "http://backend.test/legacy/artifact?path=out%2Faudio.wav";

fn urls() -> TrackUrls {
    TrackUrls {
        clean: Some(CLEAN_URL.to_string()),
        original: Some(ORIGINAL_URL.to_string()),
    }
}

fn synchronizer() -> PlaybackSynchronizer<FakeAudio> {
    let mut sync = PlaybackSynchronizer::new(FakeAudio::new());
    sync.set_tracks(urls());
    sync
}

/// Complete the element's load and deliver the load signal
fn finish_load(sync: &mut PlaybackSynchronizer<FakeAudio>) {
    let url = sync.element_mut().finish_loading();
    sync.on_source_loaded(&url);
}

#[test]
fn test_play_waits_for_source_load() {
    let mut sync = synchronizer();
    let seg = scored(3, 2.0, 20.0, 0.9);

    let used = sync.request_play(&seg, TrackSource::Clean);

    assert_eq!(used, TrackSource::Clean);
    assert_eq!(sync.element().loads, vec![CLEAN_URL]);
    assert!(!sync.is_playing());
    assert!(matches!(sync.pending(), Some(PendingAction::Play(b)) if b.index == 3));

    finish_load(&mut sync);

    assert!(sync.is_playing());
    assert_eq!(sync.element().seeks, vec![30.0]);
    assert_eq!(sync.playback_end(), Some(32.0));
    assert!(sync.pending().is_none());
}

#[test]
fn test_missing_clean_slice_falls_back_to_original() {
    let bus = EventBus::new(32);
    let mut rx = bus.subscribe();
    let mut sync = PlaybackSynchronizer::new(FakeAudio::new()).with_event_bus(bus);
    sync.set_tracks(urls());
    let seg = segment(1, 12.0, 14.5);

    let used = sync.request_play(&seg, TrackSource::Clean);
    finish_load(&mut sync);

    assert_eq!(used, TrackSource::Original);
    assert_eq!(sync.source(), Some(TrackSource::Original));
    assert_eq!(sync.element().loads, vec![ORIGINAL_URL]);
    assert_eq!(sync.notice(), Some(CLEAN_FALLBACK_NOTICE));
    assert!(sync.is_playing());
    assert_eq!(sync.element().seeks, vec![12.0]);

    let notices: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            VtpEvent::Notice { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(notices, vec![CLEAN_FALLBACK_NOTICE.to_string()]);

    sync.dismiss_notice();
    assert!(sync.notice().is_none());
}

#[test]
fn test_latest_request_wins_during_source_switch() {
    // Given: a clean play queued while the clean track loads
    let mut sync = synchronizer();
    let first = scored(1, 2.0, 20.0, 0.9);
    let second = scored(4, 3.0, 20.0, 0.9);
    sync.request_play(&first, TrackSource::Clean);

    // When: a second play on the other track is issued before the load ends
    sync.request_play(&second, TrackSource::Original);

    // Then: the clean load signal is stale and the first play never runs
    sync.on_source_loaded(CLEAN_URL);
    assert!(!sync.is_playing());
    assert!(sync.element().seeks.is_empty());

    finish_load(&mut sync);
    assert!(sync.is_playing());
    assert_eq!(sync.element().seeks, vec![40.0]);
    assert_eq!(sync.playback_end(), Some(43.0));
    assert_eq!(sync.active().map(|b| b.index), Some(4));
}

#[test]
fn test_load_signal_runs_pending_action_once() {
    let mut sync = synchronizer();
    sync.request_play(&scored(2, 2.0, 20.0, 0.9), TrackSource::Clean);
    finish_load(&mut sync);
    sync.stop();

    sync.on_source_loaded(CLEAN_URL);

    assert!(!sync.is_playing());
    assert_eq!(sync.element().seeks.len(), 1);
}

#[test]
fn test_playback_halts_at_segment_end() {
    let bus = EventBus::new(32);
    let mut rx = bus.subscribe();
    let mut sync = PlaybackSynchronizer::new(FakeAudio::new()).with_event_bus(bus);
    sync.set_tracks(urls());
    sync.request_play(&scored(5, 2.0, 20.0, 0.9), TrackSource::Clean);
    finish_load(&mut sync);

    sync.element_mut().advance_to(51.9);
    assert!(!sync.on_time_update());
    assert!(sync.is_playing());

    sync.element_mut().advance_to(52.0);
    assert!(sync.on_time_update());
    assert!(!sync.is_playing());
    assert!(sync.playback_end().is_none());
    assert!(!sync.on_time_update(), "halts once");

    let stopped = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|event| matches!(event, VtpEvent::PlaybackStopped { .. }))
        .count();
    assert_eq!(stopped, 1);
}

#[test]
fn test_scrub_clamps_to_segment() {
    let mut sync = synchronizer();
    sync.request_play(&scored(1, 4.0, 20.0, 0.9), TrackSource::Clean);
    finish_load(&mut sync);

    sync.scrub_to_fraction(0.25);
    assert_eq!(sync.element().position, 11.0);
    assert!((sync.progress_fraction() - 0.25).abs() < 1e-9);

    sync.scrub_to_fraction(1.7);
    assert_eq!(sync.element().position, 14.0);

    sync.scrub_to_fraction(-3.0);
    assert_eq!(sync.element().position, 10.0);

    sync.scrub_to_fraction(f64::NAN);
    assert_eq!(sync.element().position, 10.0);
}

#[test]
fn test_scrub_zero_length_segment() {
    let mut sync = synchronizer();
    let seg = segment(9, 5.0, 5.0);
    sync.request_play(&seg, TrackSource::Original);
    finish_load(&mut sync);

    sync.scrub_to_fraction(1.0);
    assert!((sync.element().position - 5.01).abs() < 1e-9);
}

#[test]
fn test_select_parks_without_playing_or_notice() {
    let mut sync = synchronizer();
    let seg = segment(6, 60.0, 63.0);

    sync.select_segment(&seg);
    finish_load(&mut sync);

    assert_eq!(sync.source(), Some(TrackSource::Original));
    assert!(!sync.is_playing());
    assert_eq!(sync.element().position, 60.0);
    assert!(sync.notice().is_none());
    assert_eq!(sync.active().map(|b| b.index), Some(6));
}

#[test]
fn test_toggle_resumes_inside_segment() {
    let mut sync = synchronizer();
    sync.request_play(&scored(2, 4.0, 20.0, 0.9), TrackSource::Clean);
    finish_load(&mut sync);
    sync.element_mut().advance_to(22.5);

    sync.toggle();
    assert!(!sync.is_playing());

    sync.toggle();
    assert!(sync.is_playing());
    assert_eq!(sync.element().seeks.last().copied(), Some(22.5));
    assert_eq!(sync.playback_end(), Some(24.0));
}

#[test]
fn test_missing_track_sets_notice() {
    let mut sync = PlaybackSynchronizer::new(FakeAudio::new());
    sync.set_tracks(TrackUrls {
        clean: None,
        original: Some(ORIGINAL_URL.to_string()),
    });

    sync.request_play(&scored(1, 2.0, 20.0, 0.9), TrackSource::Clean);

    assert_eq!(sync.notice(), Some("No clean track available"));
    assert!(sync.element().loads.is_empty());
    assert!(!sync.is_playing());
}

#[test]
fn test_shared_url_switch_plays_without_reload() {
    let mut sync = PlaybackSynchronizer::new(FakeAudio::new());
    sync.set_tracks(TrackUrls {
        clean: Some(ORIGINAL_URL.to_string()),
        original: Some(ORIGINAL_URL.to_string()),
    });
    let seg = scored(1, 2.0, 20.0, 0.9);
    sync.request_play(&seg, TrackSource::Clean);
    finish_load(&mut sync);
    sync.stop();

    sync.request_play(&seg, TrackSource::Original);

    assert!(sync.is_playing());
    assert_eq!(sync.source(), Some(TrackSource::Original));
    assert_eq!(sync.element().loads.len(), 1);
}

#[test]
fn test_new_tracks_drop_queued_action() {
    let mut sync = synchronizer();
    sync.request_play(&scored(1, 2.0, 20.0, 0.9), TrackSource::Clean);

    sync.set_tracks(TrackUrls {
        clean: Some("http://backend.test/other-clean.wav".to_string()),
        original: None,
    });

    assert!(sync.pending().is_none());
    assert!(sync.source().is_none());
    assert!(sync.active().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_position_watch_halts_playback() {
    let mut sync = synchronizer();
    sync.request_play(&scored(1, 2.0, 20.0, 0.9), TrackSource::Clean);
    finish_load(&mut sync);
    let sync = Arc::new(Mutex::new(sync));

    let cancel = CancellationToken::new();
    let watch = tokio::spawn(run_position_watch(
        Arc::clone(&sync),
        Duration::from_millis(50),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(sync.lock().await.is_playing());

    sync.lock().await.element_mut().advance_to(12.0);
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(!sync.lock().await.is_playing());

    cancel.cancel();
    watch.await.unwrap();
}
