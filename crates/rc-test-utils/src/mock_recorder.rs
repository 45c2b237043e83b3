//! Mock channel recorder for isolated session testing.
//!
//! [`MockRecorder`] implements [`ChannelRecorder`] without any real SDK:
//! every call is recorded on a shared [`RecorderProbe`], and tests drive the
//! event stream through an [`EventInjector`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use recording_controller::layout::MixLayout;
use recording_controller::recorder::{
    ChannelContext, ChannelRecorder, RecorderEvent, RecorderFactory,
};
use recording_controller::RecorderError;

/// Buffer size for the injected event stream.
const EVENT_CHANNEL_BUFFER: usize = 64;

/// Arguments captured from a `join_channel` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinArgs {
    pub key: Option<String>,
    pub channel: String,
    pub uid: u32,
    pub app_id: String,
    pub storage_path: PathBuf,
}

#[derive(Debug, Default)]
struct ProbeInner {
    layouts: Vec<MixLayout>,
    join_args: Option<JoinArgs>,
    left: bool,
    released: bool,
    release_count: u32,
}

/// Shared observation point for everything a [`MockRecorder`] was told to do.
///
/// Tests keep the `Arc<RecorderProbe>` after handing the recorder itself to
/// the code under test.
#[derive(Debug, Default)]
pub struct RecorderProbe {
    inner: Mutex<ProbeInner>,
}

impl RecorderProbe {
    /// Number of `set_mix_layout` calls observed.
    pub fn set_layout_calls(&self) -> usize {
        self.inner.lock().unwrap().layouts.len()
    }

    /// All layouts pushed so far, in call order.
    pub fn layouts(&self) -> Vec<MixLayout> {
        self.inner.lock().unwrap().layouts.clone()
    }

    /// The most recently pushed layout, if any.
    pub fn last_layout(&self) -> Option<MixLayout> {
        self.inner.lock().unwrap().layouts.last().cloned()
    }

    /// Whether `join_channel` was called.
    pub fn joined(&self) -> bool {
        self.inner.lock().unwrap().join_args.is_some()
    }

    /// The captured `join_channel` arguments, if joined.
    pub fn join_args(&self) -> Option<JoinArgs> {
        self.inner.lock().unwrap().join_args.clone()
    }

    /// Whether `leave_channel` was called.
    pub fn left(&self) -> bool {
        self.inner.lock().unwrap().left
    }

    /// Whether `release` was called at least once.
    pub fn released(&self) -> bool {
        self.inner.lock().unwrap().released
    }

    /// Number of `release` calls. Anything above 1 is a bug in the caller.
    pub fn release_count(&self) -> u32 {
        self.inner.lock().unwrap().release_count
    }
}

/// Sends fake recorder events into the session under test.
#[derive(Debug, Clone)]
pub struct EventInjector {
    sender: mpsc::Sender<RecorderEvent>,
}

impl EventInjector {
    /// Inject a participant-joined event.
    pub async fn participant_joined(&self, participant_id: u32) {
        let _ = self
            .sender
            .send(RecorderEvent::ParticipantJoined(participant_id))
            .await;
    }

    /// Inject a participant-left event.
    pub async fn participant_left(&self, participant_id: u32) {
        let _ = self
            .sender
            .send(RecorderEvent::ParticipantLeft(participant_id))
            .await;
    }

    /// Inject an unrecoverable recorder error.
    pub async fn error(&self, code: i32, stat: i32) {
        let _ = self.sender.send(RecorderEvent::Error { code, stat }).await;
    }
}

/// In-memory [`ChannelRecorder`] that records calls and replays injected
/// events.
#[derive(Debug)]
pub struct MockRecorder {
    probe: Arc<RecorderProbe>,
    events: Option<mpsc::Receiver<RecorderEvent>>,
    fail_join: bool,
}

impl MockRecorder {
    /// Create a recorder plus its probe and event injector.
    pub fn new() -> (Self, Arc<RecorderProbe>, EventInjector) {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let probe = Arc::new(RecorderProbe::default());

        let recorder = Self {
            probe: Arc::clone(&probe),
            events: Some(receiver),
            fail_join: false,
        };

        (recorder, probe, EventInjector { sender })
    }

    /// Make the next (and only) `join_channel` call fail.
    pub fn fail_join(&mut self) {
        self.fail_join = true;
    }
}

#[async_trait]
impl ChannelRecorder for MockRecorder {
    async fn join_channel(
        &mut self,
        key: Option<&str>,
        channel: &str,
        uid: u32,
        app_id: &str,
        storage_path: &std::path::Path,
    ) -> Result<(), RecorderError> {
        if self.fail_join {
            return Err(RecorderError::Join("simulated join failure".to_string()));
        }

        self.probe.inner.lock().unwrap().join_args = Some(JoinArgs {
            key: key.map(str::to_string),
            channel: channel.to_string(),
            uid,
            app_id: app_id.to_string(),
            storage_path: storage_path.to_path_buf(),
        });
        Ok(())
    }

    fn set_mix_layout(&mut self, layout: &MixLayout) {
        self.probe.inner.lock().unwrap().layouts.push(layout.clone());
    }

    fn leave_channel(&mut self) {
        self.probe.inner.lock().unwrap().left = true;
    }

    fn release(&mut self) {
        let mut inner = self.probe.inner.lock().unwrap();
        inner.released = true;
        inner.release_count += 1;
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<RecorderEvent>> {
        self.events.take()
    }
}

/// One recorder handed out by [`MockRecorderFactory`].
#[derive(Debug, Clone)]
pub struct CreatedRecorder {
    /// Channel the recorder was created for.
    pub channel: ChannelContext,
    /// Probe observing the recorder's calls.
    pub probe: Arc<RecorderProbe>,
    /// Injector feeding the recorder's event stream.
    pub injector: EventInjector,
}

#[derive(Debug, Default)]
struct FactoryInner {
    fail_next_create: bool,
    fail_next_join: bool,
    created: Vec<CreatedRecorder>,
}

/// [`RecorderFactory`] producing [`MockRecorder`]s and remembering each one.
#[derive(Debug, Default)]
pub struct MockRecorderFactory {
    inner: Mutex<FactoryInner>,
}

impl MockRecorderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create` call fail.
    pub fn fail_next_create(&self) {
        self.inner.lock().unwrap().fail_next_create = true;
    }

    /// Make the next created recorder fail its `join_channel` call.
    pub fn fail_next_join(&self) {
        self.inner.lock().unwrap().fail_next_join = true;
    }

    /// All recorders created so far, in creation order.
    pub fn created(&self) -> Vec<CreatedRecorder> {
        self.inner.lock().unwrap().created.clone()
    }

    /// Number of recorders created.
    pub fn created_count(&self) -> usize {
        self.inner.lock().unwrap().created.len()
    }
}

impl RecorderFactory for MockRecorderFactory {
    fn create(&self, channel: &ChannelContext) -> Result<Box<dyn ChannelRecorder>, RecorderError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_next_create {
            inner.fail_next_create = false;
            return Err(RecorderError::Internal(
                "simulated create failure".to_string(),
            ));
        }

        let (mut recorder, probe, injector) = MockRecorder::new();
        if inner.fail_next_join {
            inner.fail_next_join = false;
            recorder.fail_join();
        }

        inner.created.push(CreatedRecorder {
            channel: channel.clone(),
            probe,
            injector,
        });

        Ok(Box::new(recorder))
    }
}
