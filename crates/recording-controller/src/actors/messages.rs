//! Message types for actor communication.
//!
//! All inter-actor communication uses strongly-typed message passing via
//! `tokio::sync::mpsc`. Response patterns use `tokio::sync::oneshot` for
//! request-reply semantics.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::errors::RecorderError;
use crate::layout::{MixLayout, ParticipantId};
use crate::recorder::{ChannelContext, ChannelRecorder};

/// Messages sent to `RecorderRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Start a new recording session against a channel.
    StartSession {
        /// Optional channel key (dynamic credential), forwarded opaquely.
        key: Option<String>,
        app_id: String,
        channel_name: String,
        /// Response channel for the session info or error.
        respond_to: oneshot::Sender<Result<SessionInfo, RecorderError>>,
    },

    /// Register a session whose recorder joined successfully.
    ///
    /// Sent by the setup task spawned for `StartSession`; carries ownership
    /// of the joined recorder handle into the registry.
    RegisterSession {
        session_id: String,
        channel: ChannelContext,
        storage_path: PathBuf,
        recorder: Box<dyn ChannelRecorder>,
        /// Response channel for the original `start` caller.
        respond_to: oneshot::Sender<Result<SessionInfo, RecorderError>>,
    },

    /// Look up a session. No side effects.
    FindSession {
        session_id: String,
        respond_to: oneshot::Sender<Option<SessionInfo>>,
    },

    /// Query a session actor for its live state (layout included).
    GetSessionState {
        session_id: String,
        respond_to: oneshot::Sender<Result<SessionState, RecorderError>>,
    },

    /// Stop a session, releasing its recorder and removing it from the
    /// registry.
    StopSession {
        session_id: String,
        respond_to: oneshot::Sender<Result<(), RecorderError>>,
    },

    /// A recorder error event fired for a session; tear it down.
    ///
    /// Fire and forget: by the time this arrives the session may already be
    /// gone, which is fine.
    SessionFailed {
        session_id: String,
        code: i32,
        stat: i32,
    },

    /// Get current registry status.
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },

    /// Initiate graceful shutdown.
    Shutdown {
        /// Deadline for draining sessions.
        deadline: Duration,
        respond_to: oneshot::Sender<Result<(), RecorderError>>,
    },
}

/// Messages sent to `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// A remote participant joined the channel.
    ParticipantJoined { participant_id: ParticipantId },

    /// A remote participant left the channel.
    ParticipantLeft { participant_id: ParticipantId },

    /// Get current session state.
    GetState {
        respond_to: oneshot::Sender<SessionState>,
    },
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Immutable facts about a registered session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session id (registry key).
    pub session_id: String,
    /// Application id of the recorded channel.
    pub app_id: String,
    /// Name of the recorded channel.
    pub channel_name: String,
    /// Directory the recorder writes into.
    pub storage_path: PathBuf,
    /// Session creation timestamp (unix seconds).
    pub created_at: i64,
}

/// Live state of a session actor.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub channel: ChannelContext,
    /// Current mix layout, regions ordered by join time.
    pub layout: MixLayout,
    pub created_at: i64,
}

/// Status of the `RecorderRegistryActor`.
#[derive(Debug, Clone)]
pub struct RegistryStatus {
    /// Live sessions in the registry.
    pub session_count: usize,
    /// Whether the registry has stopped accepting new sessions.
    pub is_draining: bool,
    /// Current registry mailbox depth.
    pub mailbox_depth: usize,
}
