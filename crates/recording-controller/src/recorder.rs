//! Channel recorder boundary.
//!
//! The only external capability the core depends on: something that joins a
//! real-time channel, records its mixed media, and emits membership/error
//! events. The real SDK binding lives outside this crate; tests use the mock
//! from `rc-test-utils`.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::RecorderError;
use crate::layout::{MixLayout, ParticipantId};

/// Uid the recorder itself joins the channel as.
pub const RECORDER_UID: u32 = 0;

/// Identifies the target communication channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelContext {
    /// Application id of the channel's backend project.
    pub app_id: String,
    /// Channel (room) name.
    pub channel_name: String,
}

/// Events emitted by a channel recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A remote participant joined the channel.
    ParticipantJoined(ParticipantId),
    /// A remote participant left the channel.
    ParticipantLeft(ParticipantId),
    /// Unrecoverable recorder failure. The owning session is torn down;
    /// there is no retry.
    Error { code: i32, stat: i32 },
}

/// External channel-recorder capability.
///
/// A handle is exclusively owned by one session for its whole lifetime. The
/// session actor serializes all calls, so implementations never see
/// concurrent use.
#[async_trait]
pub trait ChannelRecorder: Send + fmt::Debug {
    /// Join the channel, recording into `storage_path`.
    async fn join_channel(
        &mut self,
        key: Option<&str>,
        channel: &str,
        uid: u32,
        app_id: &str,
        storage_path: &Path,
    ) -> Result<(), RecorderError>;

    /// Push a new mix layout. Synchronous acceptance, no result.
    fn set_mix_layout(&mut self, layout: &MixLayout);

    /// Leave the channel. Best effort, fire and forget.
    fn leave_channel(&mut self);

    /// Release all resources held by the handle.
    ///
    /// Called at most once per handle; the registry-removal guard enforces
    /// this.
    fn release(&mut self);

    /// Take the event receiver. Yields `Some` exactly once.
    fn take_events(&mut self) -> Option<mpsc::Receiver<RecorderEvent>>;
}

/// Creates recorder handles for new sessions.
pub trait RecorderFactory: Send + Sync {
    /// Construct a fresh, not-yet-joined handle for the given channel.
    fn create(&self, channel: &ChannelContext) -> Result<Box<dyn ChannelRecorder>, RecorderError>;
}
