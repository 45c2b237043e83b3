//! End-to-end session lifecycle tests over the actor system.
//!
//! All tests run against the real registry and session actors with the mock
//! recorder and storage from `rc-test-utils`. Short sleeps let injected
//! events flow through the forwarder and session mailboxes.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use recording_controller::actors::{ActorMetrics, RecorderRegistryHandle};
use recording_controller::layout::{CANVAS_HEIGHT, CANVAS_WIDTH};
use recording_controller::recorder::RECORDER_UID;
use recording_controller::{DirStorageProvisioner, RecorderError, RecorderFactory, StorageProvisioner};
use rc_test_utils::{CreatedRecorder, MockRecorderFactory, MockStorage};

/// Time to let injected events settle through the actor mailboxes.
const SETTLE: Duration = Duration::from_millis(50);

struct Harness {
    registry: RecorderRegistryHandle,
    factory: Arc<MockRecorderFactory>,
    storage: Arc<MockStorage>,
    metrics: Arc<ActorMetrics>,
}

fn harness(max_sessions: u32) -> Harness {
    let factory = Arc::new(MockRecorderFactory::new());
    let storage = Arc::new(MockStorage::new());
    let metrics = ActorMetrics::new();

    let registry = RecorderRegistryHandle::new(
        "rc-it-001".to_string(),
        max_sessions,
        Arc::clone(&storage) as Arc<dyn recording_controller::StorageProvisioner>,
        Arc::clone(&factory) as Arc<dyn recording_controller::RecorderFactory>,
        Arc::clone(&metrics),
    );

    Harness {
        registry,
        factory,
        storage,
        metrics,
    }
}

impl Harness {
    /// The recorder created for the `n`-th started session.
    fn recorder(&self, n: usize) -> CreatedRecorder {
        self.factory
            .created()
            .get(n)
            .expect("recorder should have been created")
            .clone()
    }
}

#[tokio::test]
async fn test_start_provisions_and_joins() {
    let h = harness(8);

    let info = h
        .registry
        .start(
            Some("channel-key".to_string()),
            "app-1".to_string(),
            "room-1".to_string(),
        )
        .await
        .expect("start should succeed");

    assert_eq!(info.app_id, "app-1");
    assert_eq!(info.channel_name, "room-1");
    assert_eq!(
        info.storage_path,
        PathBuf::from("mock-storage").join(&info.session_id)
    );

    // Storage was allocated for this session
    assert_eq!(h.storage.allocated(), vec![info.session_id.clone()]);

    let rec = h.recorder(0);
    assert_eq!(rec.channel.channel_name, "room-1");

    // The recorder joined as uid 0 with the key and storage path forwarded
    let args = rec.probe.join_args().expect("recorder should have joined");
    assert_eq!(args.uid, RECORDER_UID);
    assert_eq!(args.key.as_deref(), Some("channel-key"));
    assert_eq!(args.channel, "room-1");
    assert_eq!(args.app_id, "app-1");
    assert_eq!(args.storage_path, info.storage_path);

    // The empty canvas was pushed before the join
    let first = rec.probe.layouts().first().cloned().expect("initial layout");
    assert!(first.regions.is_empty());
    assert_eq!(first.canvas_width, CANVAS_WIDTH);
    assert_eq!(first.canvas_height, CANVAS_HEIGHT);

    h.registry.cancel();
}

#[tokio::test]
async fn test_start_without_key_passes_none() {
    let h = harness(8);

    h.registry
        .start(None, "app-1".to_string(), "room-2".to_string())
        .await
        .expect("start should succeed");

    let args = h.recorder(0).probe.join_args().expect("joined");
    assert_eq!(args.key, None);

    h.registry.cancel();
}

#[tokio::test]
async fn test_find_known_and_unknown() {
    let h = harness(8);

    let info = h
        .registry
        .start(None, "app-1".to_string(), "room-3".to_string())
        .await
        .expect("start should succeed");

    let found = h
        .registry
        .find(info.session_id.clone())
        .await
        .expect("find should succeed")
        .expect("session should exist");
    assert_eq!(found.session_id, info.session_id);
    assert_eq!(found.channel_name, "room-3");

    let missing = h
        .registry
        .find("no-such-session".to_string())
        .await
        .expect("find should succeed");
    assert!(missing.is_none());

    h.registry.cancel();
}

#[tokio::test]
async fn test_membership_events_drive_layout() {
    let h = harness(8);

    let info = h
        .registry
        .start(None, "app-1".to_string(), "room-4".to_string())
        .await
        .expect("start should succeed");

    let rec = h.recorder(0);
    rec.injector.participant_joined(10).await;
    rec.injector.participant_joined(20).await;
    rec.injector.participant_joined(30).await;
    tokio::time::sleep(SETTLE).await;

    let state = h
        .registry
        .session_state(info.session_id.clone())
        .await
        .expect("state should be available");

    let regions = &state.layout.regions;
    assert_eq!(regions.len(), 3);
    let uids: Vec<u32> = regions.iter().map(|r| r.participant_id).collect();
    assert_eq!(uids, vec![10, 20, 30]);

    // Three-participant arrangement: two top quadrants plus bottom-left
    let geoms: Vec<(u32, u32, u32, u32)> = regions
        .iter()
        .map(|r| (r.x, r.y, r.width, r.height))
        .collect();
    assert_eq!(
        geoms,
        vec![(0, 0, 320, 240), (320, 0, 320, 240), (0, 240, 320, 240)]
    );

    // Initial push plus one per join
    assert_eq!(rec.probe.set_layout_calls(), 4);
    let pushed = rec.probe.last_layout().expect("layout pushed");
    assert_eq!(pushed, state.layout);

    h.registry.cancel();
}

#[tokio::test]
async fn test_leave_keeps_survivor_geometry_and_pushes() {
    let h = harness(8);

    let info = h
        .registry
        .start(None, "app-1".to_string(), "room-5".to_string())
        .await
        .expect("start should succeed");

    let rec = h.recorder(0);
    rec.injector.participant_joined(1).await;
    rec.injector.participant_joined(2).await;
    tokio::time::sleep(SETTLE).await;

    let before = h
        .registry
        .session_state(info.session_id.clone())
        .await
        .expect("state")
        .layout;

    rec.injector.participant_left(1).await;
    tokio::time::sleep(SETTLE).await;

    let after = h
        .registry
        .session_state(info.session_id.clone())
        .await
        .expect("state")
        .layout;

    // Only the leaver's region is gone; the survivor keeps its half-canvas
    assert_eq!(after.regions.len(), 1);
    let survivor = after.regions.first().expect("survivor region");
    assert_eq!(survivor.participant_id, 2);
    let prior = before
        .regions
        .iter()
        .find(|r| r.participant_id == 2)
        .expect("prior region");
    assert_eq!(survivor, prior);

    // Initial + 2 joins + 1 leave, each pushed
    assert_eq!(rec.probe.set_layout_calls(), 4);

    h.registry.cancel();
}

#[tokio::test]
async fn test_fifth_participant_gets_full_canvas_region() {
    let h = harness(8);

    let info = h
        .registry
        .start(None, "app-1".to_string(), "room-6".to_string())
        .await
        .expect("start should succeed");

    let rec = h.recorder(0);
    for uid in 1..=5 {
        rec.injector.participant_joined(uid).await;
    }
    tokio::time::sleep(SETTLE).await;

    let layout = h
        .registry
        .session_state(info.session_id.clone())
        .await
        .expect("state")
        .layout;

    assert_eq!(layout.regions.len(), 5);
    let fifth = layout.regions.last().expect("fifth region");
    assert_eq!(fifth.participant_id, 5);
    assert_eq!(
        (fifth.x, fifth.y, fifth.width, fifth.height),
        (0, 0, CANVAS_WIDTH, CANVAS_HEIGHT)
    );

    h.registry.cancel();
}

#[tokio::test]
async fn test_stop_releases_recorder_and_removes_entry() {
    let h = harness(8);

    let info = h
        .registry
        .start(None, "app-1".to_string(), "room-7".to_string())
        .await
        .expect("start should succeed");

    h.registry
        .stop(info.session_id.clone())
        .await
        .expect("stop should succeed");
    tokio::time::sleep(SETTLE).await;

    // No zombie entry
    let found = h
        .registry
        .find(info.session_id.clone())
        .await
        .expect("find should succeed");
    assert!(found.is_none());

    // Recorder left and was released exactly once
    let probe = &h.recorder(0).probe;
    assert!(probe.left());
    assert_eq!(probe.release_count(), 1);

    // Stopping again reports not found
    let again = h.registry.stop(info.session_id).await;
    assert!(matches!(again, Err(RecorderError::SessionNotFound)));

    h.registry.cancel();
}

#[tokio::test]
async fn test_recorder_error_tears_session_down() {
    let h = harness(8);

    let info = h
        .registry
        .start(None, "app-1".to_string(), "room-8".to_string())
        .await
        .expect("start should succeed");

    let rec = h.recorder(0);
    rec.injector.error(12, 4).await;
    tokio::time::sleep(SETTLE).await;

    let found = h
        .registry
        .find(info.session_id)
        .await
        .expect("find should succeed");
    assert!(found.is_none());

    assert!(rec.probe.left());
    assert_eq!(rec.probe.release_count(), 1);

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.sessions_failed, 1);
    assert_eq!(snapshot.active_sessions, 0);

    h.registry.cancel();
}

#[tokio::test]
async fn test_join_failure_releases_and_leaves_no_entry() {
    let h = harness(8);
    h.factory.fail_next_join();

    let result = h
        .registry
        .start(None, "app-1".to_string(), "room-9".to_string())
        .await;
    assert!(matches!(result, Err(RecorderError::Join(_))));

    // The created recorder was released, and no session was registered
    assert_eq!(h.factory.created_count(), 1);
    let probe = &h.recorder(0).probe;
    assert!(probe.released());

    let status = h.registry.status().await.expect("status");
    assert_eq!(status.session_count, 0);

    h.registry.cancel();
}

#[tokio::test]
async fn test_storage_failure_creates_no_recorder() {
    let h = harness(8);
    h.storage.fail_next();

    let result = h
        .registry
        .start(None, "app-1".to_string(), "room-10".to_string())
        .await;
    assert!(matches!(result, Err(RecorderError::Storage(_))));

    assert_eq!(h.factory.created_count(), 0);

    let status = h.registry.status().await.expect("status");
    assert_eq!(status.session_count, 0);

    h.registry.cancel();
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let h = harness(8);

    let a = h
        .registry
        .start(None, "app-1".to_string(), "room-a".to_string())
        .await
        .expect("start a");
    let b = h
        .registry
        .start(None, "app-1".to_string(), "room-b".to_string())
        .await
        .expect("start b");

    // Events in session A must not leak into session B
    h.recorder(0).injector.participant_joined(1).await;
    h.recorder(0).injector.participant_joined(2).await;
    h.recorder(1).injector.participant_joined(9).await;
    tokio::time::sleep(SETTLE).await;

    let state_a = h
        .registry
        .session_state(a.session_id)
        .await
        .expect("state a");
    let state_b = h
        .registry
        .session_state(b.session_id)
        .await
        .expect("state b");

    assert_eq!(state_a.layout.regions.len(), 2);
    assert_eq!(state_b.layout.regions.len(), 1);
    assert_eq!(
        state_b
            .layout
            .regions
            .first()
            .map(|r| r.participant_id),
        Some(9)
    );

    h.registry.cancel();
}

#[tokio::test]
async fn test_shutdown_releases_all_recorders() {
    let h = harness(8);

    h.registry
        .start(None, "app-1".to_string(), "room-x".to_string())
        .await
        .expect("start x");
    h.registry
        .start(None, "app-1".to_string(), "room-y".to_string())
        .await
        .expect("start y");

    h.registry
        .shutdown(Duration::from_secs(5))
        .await
        .expect("shutdown should succeed");
    tokio::time::sleep(SETTLE).await;

    for rec in h.factory.created() {
        assert!(rec.probe.left());
        assert_eq!(rec.probe.release_count(), 1);
    }
}

#[tokio::test]
async fn test_capacity_limit_rejects_start() {
    let h = harness(1);

    h.registry
        .start(None, "app-1".to_string(), "room-a".to_string())
        .await
        .expect("first start should succeed");

    let result = h
        .registry
        .start(None, "app-1".to_string(), "room-b".to_string())
        .await;
    assert!(matches!(result, Err(RecorderError::CapacityExceeded)));

    h.registry.cancel();
}

#[tokio::test]
async fn test_draining_rejects_start() {
    let h = harness(8);

    h.registry
        .shutdown(Duration::from_secs(1))
        .await
        .expect("shutdown should succeed");

    // The registry may still be draining or already gone
    let result = h
        .registry
        .start(None, "app-1".to_string(), "room-late".to_string())
        .await;
    assert!(matches!(
        result,
        Err(RecorderError::Draining) | Err(RecorderError::Internal(_))
    ));
}

/// Registry over a real filesystem provisioner rooted in a tempdir.
fn fs_registry(
    root: &std::path::Path,
    factory: &Arc<MockRecorderFactory>,
) -> RecorderRegistryHandle {
    RecorderRegistryHandle::new(
        "rc-it-fs".to_string(),
        8,
        Arc::new(DirStorageProvisioner::new(root)) as Arc<dyn StorageProvisioner>,
        Arc::clone(factory) as Arc<dyn RecorderFactory>,
        ActorMetrics::new(),
    )
}

#[tokio::test]
async fn test_failed_join_removes_storage_directory() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let factory = Arc::new(MockRecorderFactory::new());
    factory.fail_next_join();
    let registry = fs_registry(tmp.path(), &factory);

    let result = registry
        .start(None, "app-1".to_string(), "room-fs-1".to_string())
        .await;
    assert!(matches!(result, Err(RecorderError::Join(_))));

    // The allocated session directory must not be left behind
    let entries: Vec<_> = std::fs::read_dir(tmp.path())
        .expect("read_dir")
        .collect();
    assert!(entries.is_empty(), "leaked storage: {entries:?}");

    registry.cancel();
}

#[tokio::test]
async fn test_failed_create_removes_storage_directory() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let factory = Arc::new(MockRecorderFactory::new());
    factory.fail_next_create();
    let registry = fs_registry(tmp.path(), &factory);

    let result = registry
        .start(None, "app-1".to_string(), "room-fs-2".to_string())
        .await;
    assert!(matches!(result, Err(RecorderError::Internal(_))));
    assert_eq!(factory.created_count(), 0);

    let entries: Vec<_> = std::fs::read_dir(tmp.path())
        .expect("read_dir")
        .collect();
    assert!(entries.is_empty(), "leaked storage: {entries:?}");

    registry.cancel();
}

#[tokio::test]
async fn test_stopped_session_keeps_storage_directory() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let factory = Arc::new(MockRecorderFactory::new());
    let registry = fs_registry(tmp.path(), &factory);

    let info = registry
        .start(None, "app-1".to_string(), "room-fs-3".to_string())
        .await
        .expect("start should succeed");

    registry
        .stop(info.session_id)
        .await
        .expect("stop should succeed");
    tokio::time::sleep(SETTLE).await;

    // Recordings outlive the session; only abandoned starts are cleaned
    assert!(info.storage_path.is_dir());

    registry.cancel();
}

#[tokio::test]
async fn test_session_state_unknown_session() {
    let h = harness(8);

    let result = h.registry.session_state("no-such".to_string()).await;
    assert!(matches!(result, Err(RecorderError::SessionNotFound)));

    h.registry.cancel();
}
