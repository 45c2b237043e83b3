//! `RecorderRegistryActor` - singleton supervisor for session actors.
//!
//! The `RecorderRegistryActor` is the top-level actor in the hierarchy:
//!
//! - Singleton per controller instance
//! - Exclusively owns the session map (session id -> managed session)
//! - Supervises N `SessionActor` instances
//! - Handles session start/stop and recorder-error teardown
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! # Session Startup
//!
//! Starting a session needs storage allocation and a channel join, both of
//! which can stall. The registry therefore never awaits them inline: it
//! spawns a setup task per `StartSession`, and the task reports back with
//! `RegisterSession` carrying the joined recorder. A slow join blocks only
//! its own caller, never the registry loop.
//!
//! # Graceful Shutdown
//!
//! On shutdown, the registry:
//! 1. Sets `accepting_new = false`
//! 2. Cancels the root `CancellationToken` (propagates to all sessions)
//! 3. Waits for session actors to release their recorders

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::messages::{RegistryMessage, RegistryStatus, SessionInfo, SessionState};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::session::{SessionActor, SessionActorHandle};
use crate::errors::RecorderError;
use crate::layout::MixLayout;
use crate::recorder::{ChannelContext, ChannelRecorder, RecorderFactory, RECORDER_UID};
use crate::storage::StorageProvisioner;

/// Channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Handle to the `RecorderRegistryActor`.
///
/// This is the public interface for interacting with the registry.
/// All methods are async and return results via oneshot channels.
#[derive(Clone)]
pub struct RecorderRegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RecorderRegistryHandle {
    /// Create a new `RecorderRegistryActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    ///
    /// # Arguments
    ///
    /// * `rc_id` - Controller instance id
    /// * `max_sessions` - Concurrent session limit
    /// * `storage` - Per-session storage provisioner
    /// * `factory` - Recorder handle factory
    /// * `metrics` - Shared actor metrics
    #[must_use]
    pub fn new(
        rc_id: String,
        max_sessions: u32,
        storage: Arc<dyn StorageProvisioner>,
        factory: Arc<dyn RecorderFactory>,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RecorderRegistryActor::new(
            rc_id,
            receiver,
            sender.clone(),
            cancel_token.clone(),
            max_sessions,
            storage,
            factory,
            Arc::clone(&metrics),
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Start a new recording session against a channel.
    ///
    /// Allocates storage, joins the channel as the recorder, and registers
    /// the session. Returns the registered session's info, or an error if
    /// any step failed (in which case no session entry exists).
    pub async fn start(
        &self,
        key: Option<String>,
        app_id: String,
        channel_name: String,
    ) -> Result<SessionInfo, RecorderError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::StartSession {
                key,
                app_id,
                channel_name,
                respond_to: tx,
            })
            .await
            .map_err(|e| RecorderError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RecorderError::Internal(format!("response receive failed: {e}")))?
    }

    /// Look up a session by id. Returns `None` if unknown.
    pub async fn find(&self, session_id: String) -> Result<Option<SessionInfo>, RecorderError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::FindSession {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RecorderError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RecorderError::Internal(format!("response receive failed: {e}")))
    }

    /// Get a session's live state, layout included.
    pub async fn session_state(&self, session_id: String) -> Result<SessionState, RecorderError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetSessionState {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RecorderError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RecorderError::Internal(format!("response receive failed: {e}")))?
    }

    /// Stop a session, releasing its recorder.
    pub async fn stop(&self, session_id: String) -> Result<(), RecorderError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::StopSession {
                session_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| RecorderError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RecorderError::Internal(format!("response receive failed: {e}")))?
    }

    /// Get the current registry status.
    pub async fn status(&self) -> Result<RegistryStatus, RecorderError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| RecorderError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RecorderError::Internal(format!("response receive failed: {e}")))
    }

    /// Initiate graceful shutdown.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RecorderError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Shutdown {
                deadline,
                respond_to: tx,
            })
            .await
            .map_err(|e| RecorderError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RecorderError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning child actors.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed session.
struct ManagedSession {
    /// Handle to the session actor.
    handle: SessionActorHandle,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
    /// Immutable session facts, served by `find` without touching the actor.
    info: SessionInfo,
}

/// The `RecorderRegistryActor` implementation.
///
/// This struct owns the actor state and runs the message loop.
pub struct RecorderRegistryActor {
    /// Controller instance id.
    rc_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Sender clone, handed to setup tasks and event forwarders.
    sender: mpsc::Sender<RegistryMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    /// Managed sessions by id.
    sessions: HashMap<String, ManagedSession>,
    /// Whether the registry is accepting new sessions.
    accepting_new: bool,
    /// Concurrent session limit.
    max_sessions: u32,
    /// Per-session storage provisioner.
    storage: Arc<dyn StorageProvisioner>,
    /// Recorder handle factory.
    factory: Arc<dyn RecorderFactory>,
    /// Shared metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RecorderRegistryActor {
    /// Create a new registry actor (not started).
    #[allow(clippy::too_many_arguments)]
    fn new(
        rc_id: String,
        receiver: mpsc::Receiver<RegistryMessage>,
        sender: mpsc::Sender<RegistryMessage>,
        cancel_token: CancellationToken,
        max_sessions: u32,
        storage: Arc<dyn StorageProvisioner>,
        factory: Arc<dyn RecorderFactory>,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Registry, &rc_id);

        Self {
            rc_id,
            receiver,
            sender,
            cancel_token,
            sessions: HashMap::new(),
            accepting_new: true,
            max_sessions,
            storage,
            factory,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.registry", fields(rc_id = %self.rc_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            max_sessions = self.max_sessions,
            "RecorderRegistryActor started"
        );

        loop {
            // Check for terminated session actors
            self.check_session_health().await;

            tokio::select! {
                // Handle cancellation
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        "RecorderRegistryActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                // Handle messages
                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            // Channel closed, exit
                            info!(
                                target: "rc.actor.registry",
                                rc_id = %self.rc_id,
                                "RecorderRegistryActor channel closed, exiting"
                            );
                            self.graceful_shutdown().await;
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            sessions_remaining = self.sessions.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RecorderRegistryActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::StartSession {
                key,
                app_id,
                channel_name,
                respond_to,
            } => {
                self.handle_start(key, app_id, channel_name, respond_to);
            }

            RegistryMessage::RegisterSession {
                session_id,
                channel,
                storage_path,
                recorder,
                respond_to,
            } => {
                let result = self.register_session(session_id, channel, storage_path, recorder);
                let _ = respond_to.send(result);
            }

            RegistryMessage::FindSession {
                session_id,
                respond_to,
            } => {
                let info = self.sessions.get(&session_id).map(|m| m.info.clone());
                let _ = respond_to.send(info);
            }

            RegistryMessage::GetSessionState {
                session_id,
                respond_to,
            } => {
                let result = self.get_session_state(&session_id).await;
                let _ = respond_to.send(result);
            }

            RegistryMessage::StopSession {
                session_id,
                respond_to,
            } => {
                let result = self.stop_session(&session_id);
                let _ = respond_to.send(result);
            }

            RegistryMessage::SessionFailed {
                session_id,
                code,
                stat,
            } => {
                self.handle_session_failed(&session_id, code, stat);
            }

            RegistryMessage::GetStatus { respond_to } => {
                let status = self.get_status();
                let _ = respond_to.send(status);
            }

            RegistryMessage::Shutdown {
                deadline,
                respond_to,
            } => {
                let result = self.initiate_shutdown(deadline);
                let _ = respond_to.send(result);
            }
        }
    }

    /// Begin starting a session: validate, then hand off to a setup task.
    ///
    /// The setup task does the slow work (storage allocation, channel join)
    /// and reports back with `RegisterSession`. Errors before registration
    /// go straight to the caller; nothing is inserted into the map.
    fn handle_start(
        &mut self,
        key: Option<String>,
        app_id: String,
        channel_name: String,
        respond_to: tokio::sync::oneshot::Sender<Result<SessionInfo, RecorderError>>,
    ) {
        if !self.accepting_new {
            let _ = respond_to.send(Err(RecorderError::Draining));
            return;
        }

        if self.sessions.len() >= self.max_sessions as usize {
            warn!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                max_sessions = self.max_sessions,
                "Session capacity reached, rejecting start"
            );
            let _ = respond_to.send(Err(RecorderError::CapacityExceeded));
            return;
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        if self.sessions.contains_key(&session_id) {
            let _ = respond_to.send(Err(RecorderError::Conflict(
                "Session id collision".to_string(),
            )));
            return;
        }

        let channel = ChannelContext {
            app_id,
            channel_name,
        };

        debug!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            session_id = %session_id,
            channel = %channel.channel_name,
            "Spawning session setup task"
        );

        let storage = Arc::clone(&self.storage);
        let factory = Arc::clone(&self.factory);
        let registry = self.sender.clone();

        tokio::spawn(async move {
            let (storage_path, recorder) =
                match prepare_session(&session_id, key, &channel, &storage, &factory).await {
                    Ok(prepared) => prepared,
                    Err(e) => {
                        let _ = respond_to.send(Err(e));
                        return;
                    }
                };

            let msg = RegistryMessage::RegisterSession {
                session_id,
                channel,
                storage_path,
                recorder,
                respond_to,
            };

            if let Err(send_error) = registry.send(msg).await {
                // Registry gone; release the joined recorder here
                if let RegistryMessage::RegisterSession {
                    session_id,
                    storage_path,
                    mut recorder,
                    respond_to,
                    ..
                } = send_error.0
                {
                    recorder.leave_channel();
                    recorder.release();
                    cleanup_storage(&session_id, &storage_path).await;
                    let _ = respond_to.send(Err(RecorderError::Draining));
                }
            }
        });
    }

    /// Register a session whose recorder joined successfully.
    ///
    /// If the registry started draining while setup was in flight, the
    /// recorder is released and the allocated storage removed instead.
    fn register_session(
        &mut self,
        session_id: String,
        channel: ChannelContext,
        storage_path: PathBuf,
        mut recorder: Box<dyn ChannelRecorder>,
    ) -> Result<SessionInfo, RecorderError> {
        if !self.accepting_new {
            warn!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                session_id = %session_id,
                "Draining, releasing freshly joined recorder"
            );
            recorder.leave_channel();
            recorder.release();
            tokio::spawn(async move { cleanup_storage(&session_id, &storage_path).await });
            return Err(RecorderError::Draining);
        }

        if self.sessions.contains_key(&session_id) {
            recorder.leave_channel();
            recorder.release();
            tokio::spawn(async move { cleanup_storage(&session_id, &storage_path).await });
            return Err(RecorderError::Conflict("Session already exists".to_string()));
        }

        let session_token = self.cancel_token.child_token();
        let (handle, task_handle) = SessionActor::spawn(
            session_id.clone(),
            channel.clone(),
            recorder,
            session_token,
            Arc::clone(&self.metrics),
            self.sender.clone(),
        );

        let info = SessionInfo {
            session_id: session_id.clone(),
            app_id: channel.app_id,
            channel_name: channel.channel_name,
            storage_path,
            created_at: chrono::Utc::now().timestamp(),
        };

        self.sessions.insert(
            session_id.clone(),
            ManagedSession {
                handle,
                task_handle,
                info: info.clone(),
            },
        );

        self.metrics.session_started();

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            session_id = %session_id,
            channel = %info.channel_name,
            total_sessions = self.sessions.len(),
            "Session registered"
        );

        Ok(info)
    }

    /// Query a session actor for its live state.
    async fn get_session_state(&self, session_id: &str) -> Result<SessionState, RecorderError> {
        match self.sessions.get(session_id) {
            Some(managed) => managed.handle.get_state().await,
            None => Err(RecorderError::SessionNotFound),
        }
    }

    /// Stop a session.
    ///
    /// Removes the entry and cancels the session actor, which releases the
    /// recorder. Waiting for the actor task happens in a background task so
    /// the message loop never blocks.
    fn stop_session(&mut self, session_id: &str) -> Result<(), RecorderError> {
        match self.sessions.remove(session_id) {
            Some(managed) => {
                debug!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    session_id = %session_id,
                    "Stopping session actor"
                );

                managed.handle.cancel();
                self.await_session_task(session_id, managed.task_handle);
                self.metrics.session_stopped();

                info!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    session_id = %session_id,
                    total_sessions = self.sessions.len(),
                    "Session stopped"
                );

                Ok(())
            }
            None => Err(RecorderError::SessionNotFound),
        }
    }

    /// Tear down a session whose recorder reported an unrecoverable error.
    fn handle_session_failed(&mut self, session_id: &str, code: i32, stat: i32) {
        match self.sessions.remove(session_id) {
            Some(managed) => {
                error!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    session_id = %session_id,
                    code,
                    stat,
                    "Recorder error, tearing session down"
                );

                managed.handle.cancel();
                self.await_session_task(session_id, managed.task_handle);
                self.metrics.session_failed();
            }
            None => {
                // Stop may have raced the error event
                debug!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    session_id = %session_id,
                    "Error event for unknown session, ignoring"
                );
            }
        }
    }

    /// Wait for a removed session's task in the background.
    fn await_session_task(&self, session_id: &str, task_handle: JoinHandle<()>) {
        let session_id_owned = session_id.to_string();
        let rc_id = self.rc_id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(Duration::from_secs(5), task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.registry",
                        rc_id = %rc_id,
                        session_id = %session_id_owned,
                        "Session actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %rc_id,
                        session_id = %session_id_owned,
                        error = ?e,
                        "Session actor task panicked during removal"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %rc_id,
                        session_id = %session_id_owned,
                        "Session actor task cleanup timed out"
                    );
                }
            }
        });
    }

    /// Get current registry status.
    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            session_count: self.sessions.len(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Initiate graceful shutdown.
    fn initiate_shutdown(&mut self, _deadline: Duration) -> Result<(), RecorderError> {
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            session_count = self.sessions.len(),
            "Initiating graceful shutdown"
        );

        // Stop accepting new sessions
        self.accepting_new = false;

        // Cancel the root token (propagates to all sessions)
        self.cancel_token.cancel();

        Ok(())
    }

    /// Perform graceful shutdown.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            session_count = self.sessions.len(),
            "Performing graceful shutdown"
        );

        // Stop accepting new sessions
        self.accepting_new = false;

        // Cancel all session actors (already done via parent token, but be explicit)
        for (session_id, managed) in &self.sessions {
            debug!(
                target: "rc.actor.registry",
                rc_id = %self.rc_id,
                session_id = %session_id,
                "Cancelling session actor"
            );
            managed.handle.cancel();
        }

        // Wait for all session tasks to complete
        for (session_id, managed) in self.sessions.drain() {
            match tokio::time::timeout(Duration::from_secs(30), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        session_id = %session_id,
                        "Session actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        session_id = %session_id,
                        error = ?e,
                        "Session actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "rc.actor.registry",
                        rc_id = %self.rc_id,
                        session_id = %session_id,
                        "Session actor shutdown timed out"
                    );
                }
            }
            self.metrics.session_stopped();
        }

        info!(
            target: "rc.actor.registry",
            rc_id = %self.rc_id,
            "Graceful shutdown complete"
        );
    }

    /// Check health of managed session actors.
    async fn check_session_health(&mut self) {
        let mut finished_sessions = Vec::new();

        for (session_id, managed) in &self.sessions {
            if managed.task_handle.is_finished() {
                warn!(
                    target: "rc.actor.registry",
                    rc_id = %self.rc_id,
                    session_id = %session_id,
                    "Session actor task finished unexpectedly"
                );
                finished_sessions.push(session_id.clone());
            }
        }

        for session_id in finished_sessions {
            if let Some(managed) = self.sessions.remove(&session_id) {
                // Check if it was a panic
                match managed.task_handle.await {
                    Ok(()) => {
                        info!(
                            target: "rc.actor.registry",
                            rc_id = %self.rc_id,
                            session_id = %session_id,
                            "Session actor exited cleanly"
                        );
                    }
                    Err(join_error) => {
                        if join_error.is_panic() {
                            error!(
                                target: "rc.actor.registry",
                                rc_id = %self.rc_id,
                                session_id = %session_id,
                                error = ?join_error,
                                "Session actor panicked"
                            );
                            self.metrics.record_panic();
                        }
                    }
                }

                self.metrics.session_stopped();
            }
        }
    }
}

/// Allocate storage and bring up a joined recorder for a new session.
///
/// Runs inside the per-session setup task. Returns the storage path and the
/// joined recorder, or an error with nothing left behind: a recorder whose
/// join failed is released before returning.
async fn prepare_session(
    session_id: &str,
    key: Option<String>,
    channel: &ChannelContext,
    storage: &Arc<dyn StorageProvisioner>,
    factory: &Arc<dyn RecorderFactory>,
) -> Result<(PathBuf, Box<dyn ChannelRecorder>), RecorderError> {
    let storage_path = storage.allocate(session_id).await?;

    let mut recorder = match factory.create(channel) {
        Ok(recorder) => recorder,
        Err(e) => {
            cleanup_storage(session_id, &storage_path).await;
            return Err(e);
        }
    };

    // Push the empty canvas before anyone joins
    recorder.set_mix_layout(&MixLayout::new());

    if let Err(e) = recorder
        .join_channel(
            key.as_deref(),
            &channel.channel_name,
            RECORDER_UID,
            &channel.app_id,
            &storage_path,
        )
        .await
    {
        warn!(
            target: "rc.actor.registry",
            session_id = %session_id,
            channel = %channel.channel_name,
            error = %e,
            "Channel join failed, releasing recorder"
        );
        recorder.release();
        cleanup_storage(session_id, &storage_path).await;
        return Err(e);
    }

    Ok((storage_path, recorder))
}

/// Remove the directory allocated for a session that never registered.
///
/// Best effort: a failure leaves the directory behind and is logged.
async fn cleanup_storage(session_id: &str, storage_path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(storage_path).await {
        warn!(
            target: "rc.actor.registry",
            session_id = %session_id,
            path = %storage_path.display(),
            error = %e,
            "Failed to remove storage for abandoned session"
        );
    }
}

