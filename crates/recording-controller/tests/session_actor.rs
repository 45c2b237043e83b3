//! Session actor tests against the mock recorder.
//!
//! These drive a single `SessionActor` directly, without the registry, to
//! pin the per-session behavior: layout updates per event, error routing,
//! and exactly-one release on cancellation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use recording_controller::actors::messages::RegistryMessage;
use recording_controller::actors::session::{SessionActor, SessionActorHandle};
use recording_controller::actors::ActorMetrics;
use recording_controller::recorder::ChannelContext;
use rc_test_utils::{EventInjector, MockRecorder, RecorderProbe};

fn test_channel() -> ChannelContext {
    ChannelContext {
        app_id: "app-1".to_string(),
        channel_name: "room-1".to_string(),
    }
}

fn spawn_session() -> (
    SessionActorHandle,
    JoinHandle<()>,
    Arc<RecorderProbe>,
    EventInjector,
    mpsc::Receiver<RegistryMessage>,
) {
    let (recorder, probe, injector) = MockRecorder::new();
    let (registry_tx, registry_rx) = mpsc::channel(8);
    let (handle, task) = SessionActor::spawn(
        "session-1".to_string(),
        test_channel(),
        Box::new(recorder),
        CancellationToken::new(),
        ActorMetrics::new(),
        registry_tx,
    );
    (handle, task, probe, injector, registry_rx)
}

#[tokio::test]
async fn test_join_event_updates_and_pushes_layout() {
    let (handle, _task, probe, injector, _registry_rx) = spawn_session();
    assert_eq!(handle.session_id(), "session-1");

    injector.participant_joined(11).await;
    injector.participant_joined(22).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let state = handle.get_state().await.unwrap();
    assert_eq!(state.layout.regions.len(), 2);
    assert_eq!(state.layout.regions[0].participant_id, 11);
    assert_eq!(state.layout.regions[1].participant_id, 22);

    // Every recomputation was pushed to the recorder
    assert_eq!(probe.set_layout_calls(), 2);

    handle.cancel();
}

#[tokio::test]
async fn test_leave_event_keeps_survivor_geometry() {
    let (handle, _task, probe, injector, _registry_rx) = spawn_session();

    injector.participant_joined(1).await;
    injector.participant_joined(2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let before = handle.get_state().await.unwrap().layout;

    injector.participant_left(2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let after = handle.get_state().await.unwrap().layout;
    assert_eq!(after.regions.len(), 1);
    assert_eq!(after.regions[0], before.regions[0]);
    assert_eq!(probe.set_layout_calls(), 3);

    handle.cancel();
}

#[tokio::test]
async fn test_error_event_routed_to_registry() {
    let (handle, _task, _probe, injector, mut registry_rx) = spawn_session();

    injector.error(12, 4).await;

    let msg = tokio::time::timeout(Duration::from_secs(1), registry_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        msg,
        RegistryMessage::SessionFailed {
            session_id,
            code: 12,
            stat: 4,
        } if session_id == "session-1"
    ));

    handle.cancel();
}

#[tokio::test]
async fn test_cancel_releases_recorder_once() {
    let (handle, task, probe, _injector, _registry_rx) = spawn_session();

    handle.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    assert!(probe.left());
    assert!(probe.released());
    assert_eq!(probe.release_count(), 1);
}

#[tokio::test]
async fn test_duplicate_join_appends_second_region() {
    let (handle, _task, _probe, injector, _registry_rx) = spawn_session();

    injector.participant_joined(5).await;
    injector.participant_joined(5).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let state = handle.get_state().await.unwrap();
    assert_eq!(state.layout.regions.len(), 2);
    assert!(state.layout.regions.iter().all(|r| r.participant_id == 5));

    handle.cancel();
}
