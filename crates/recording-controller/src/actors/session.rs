//! `SessionActor` - per-session actor that owns one recording.
//!
//! Each `SessionActor`:
//! - Exclusively owns the channel-recorder handle and the current mix layout
//! - Applies membership events to the layout and pushes every recomputation
//!   back to the recorder
//! - Releases the recorder exactly once on its shutdown path
//!
//! Membership events reach the actor through a forwarder task that drains the
//! recorder's event stream. Error events bypass the session and go straight
//! to the registry, which removes the session and cancels this actor.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::{RegistryMessage, SessionMessage, SessionState};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::errors::RecorderError;
use crate::layout::{MixLayout, ParticipantId};
use crate::recorder::{ChannelContext, ChannelRecorder, RecorderEvent};

/// Channel buffer size for the session mailbox.
const SESSION_CHANNEL_BUFFER: usize = 100;

/// Handle to a `SessionActor`.
#[derive(Debug, Clone)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    session_id: String,
}

impl SessionActorHandle {
    /// Get the session id.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Get current session state (layout included).
    pub async fn get_state(&self) -> Result<SessionState, RecorderError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(SessionMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| RecorderError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| RecorderError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the session actor, triggering recorder release.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    session_id: String,
    channel: ChannelContext,
    /// Exclusively owned recorder handle; released on shutdown.
    recorder: Box<dyn ChannelRecorder>,
    /// Current mix layout, regions ordered by join time.
    layout: MixLayout,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    created_at: i64,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl SessionActor {
    /// Spawn a new session actor around a joined recorder handle.
    ///
    /// Takes the recorder's event stream and spawns a forwarder task that
    /// turns events into typed messages: membership events go to this actor,
    /// error events go to `registry` as `SessionFailed`.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        session_id: String,
        channel: ChannelContext,
        mut recorder: Box<dyn ChannelRecorder>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        registry: mpsc::Sender<RegistryMessage>,
    ) -> (SessionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);

        match recorder.take_events() {
            Some(events) => {
                tokio::spawn(forward_events(
                    session_id.clone(),
                    events,
                    sender.clone(),
                    registry,
                    cancel_token.clone(),
                ));
            }
            None => {
                // A recorder without an event stream never updates its
                // layout; the session still records until stopped.
                warn!(
                    target: "rc.actor.session",
                    session_id = %session_id,
                    "Recorder exposed no event stream"
                );
            }
        }

        let actor = Self {
            session_id: session_id.clone(),
            channel,
            recorder,
            layout: MixLayout::new(),
            receiver,
            cancel_token: cancel_token.clone(),
            created_at: chrono::Utc::now().timestamp(),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Session, &session_id),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionActorHandle {
            sender,
            cancel_token,
            session_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "rc.actor.session", fields(session_id = %self.session_id))]
    async fn run(mut self) {
        info!(
            target: "rc.actor.session",
            session_id = %self.session_id,
            channel = %self.channel.channel_name,
            "SessionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "rc.actor.session",
                        session_id = %self.session_id,
                        "SessionActor received cancellation signal"
                    );
                    self.release_recorder();
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            // All senders gone; never leak the recorder
                            info!(
                                target: "rc.actor.session",
                                session_id = %self.session_id,
                                "SessionActor channel closed, exiting"
                            );
                            self.release_recorder();
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "rc.actor.session",
            session_id = %self.session_id,
            regions = self.layout.regions.len(),
            messages_processed = self.mailbox.messages_processed(),
            "SessionActor stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::ParticipantJoined { participant_id } => {
                self.handle_participant_joined(participant_id);
            }

            SessionMessage::ParticipantLeft { participant_id } => {
                self.handle_participant_left(participant_id);
            }

            SessionMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state());
            }
        }
    }

    /// Rearrange the layout for a joining participant and push it.
    fn handle_participant_joined(&mut self, participant_id: ParticipantId) {
        if self.layout.contains(participant_id) {
            // Duplicate join events still append (documented behavior)
            warn!(
                target: "rc.actor.session",
                session_id = %self.session_id,
                participant_id,
                "Participant already has a region, appending another"
            );
        }

        self.layout.apply_join(participant_id);
        self.recorder.set_mix_layout(&self.layout);

        info!(
            target: "rc.actor.session",
            session_id = %self.session_id,
            participant_id,
            regions = self.layout.regions.len(),
            "Participant joined, layout updated"
        );
    }

    /// Drop the leaving participant's region and push the layout.
    ///
    /// Survivors keep their geometry; only joins rearrange.
    fn handle_participant_left(&mut self, participant_id: ParticipantId) {
        let removed = self.layout.apply_leave(participant_id);
        if !removed {
            debug!(
                target: "rc.actor.session",
                session_id = %self.session_id,
                participant_id,
                "Leave event for participant without a region"
            );
        }
        self.recorder.set_mix_layout(&self.layout);

        info!(
            target: "rc.actor.session",
            session_id = %self.session_id,
            participant_id,
            regions = self.layout.regions.len(),
            "Participant left, layout updated"
        );
    }

    /// Get current session state.
    fn state(&self) -> SessionState {
        SessionState {
            session_id: self.session_id.clone(),
            channel: self.channel.clone(),
            layout: self.layout.clone(),
            created_at: self.created_at,
        }
    }

    /// Leave the channel and release the recorder.
    ///
    /// Runs exactly once, on whichever exit path the actor takes.
    fn release_recorder(&mut self) {
        info!(
            target: "rc.actor.session",
            session_id = %self.session_id,
            "Releasing recorder"
        );
        self.recorder.leave_channel();
        self.recorder.release();
    }
}

/// Drain the recorder's event stream into typed actor messages.
///
/// Membership events go to the session actor; an error event is terminal and
/// goes to the registry, which removes the session. Ends when the stream
/// closes, an error fires, or the session is cancelled.
async fn forward_events(
    session_id: String,
    mut events: mpsc::Receiver<RecorderEvent>,
    session: mpsc::Sender<SessionMessage>,
    registry: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(
                    target: "rc.actor.session",
                    session_id = %session_id,
                    "Event forwarder cancelled"
                );
                break;
            }

            event = events.recv() => {
                match event {
                    Some(RecorderEvent::ParticipantJoined(participant_id)) => {
                        let msg = SessionMessage::ParticipantJoined { participant_id };
                        if session.send(msg).await.is_err() {
                            debug!(
                                target: "rc.actor.session",
                                session_id = %session_id,
                                "Session gone, dropping join event"
                            );
                            break;
                        }
                    }
                    Some(RecorderEvent::ParticipantLeft(participant_id)) => {
                        let msg = SessionMessage::ParticipantLeft { participant_id };
                        if session.send(msg).await.is_err() {
                            debug!(
                                target: "rc.actor.session",
                                session_id = %session_id,
                                "Session gone, dropping leave event"
                            );
                            break;
                        }
                    }
                    Some(RecorderEvent::Error { code, stat }) => {
                        // Terminal: the registry tears the session down
                        let _ = registry
                            .send(RegistryMessage::SessionFailed {
                                session_id: session_id.clone(),
                                code,
                                stat,
                            })
                            .await;
                        break;
                    }
                    None => {
                        debug!(
                            target: "rc.actor.session",
                            session_id = %session_id,
                            "Recorder event stream closed"
                        );
                        break;
                    }
                }
            }
        }
    }
}

