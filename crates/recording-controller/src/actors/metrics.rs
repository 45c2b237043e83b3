//! Actor metrics and mailbox monitoring.
//!
//! Internal counters only; there is no exporter surface. Mailbox depth is
//! tracked with per-actor-type thresholds:
//!
//! | Actor Type | Normal | Warning  |
//! |------------|--------|----------|
//! | Registry   | < 100  | >= 500   |
//! | Session    | < 50   | >= 200   |

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

/// Mailbox depth thresholds for the registry actor.
pub const REGISTRY_MAILBOX_NORMAL: usize = 100;
pub const REGISTRY_MAILBOX_WARNING: usize = 500;

/// Mailbox depth thresholds for session actors.
pub const SESSION_MAILBOX_NORMAL: usize = 50;
pub const SESSION_MAILBOX_WARNING: usize = 200;

/// Actor type for log labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    /// `RecorderRegistryActor` (singleton).
    Registry,
    /// `SessionActor` (one per recording session).
    Session,
}

impl ActorType {
    /// Returns the actor type as a string for log labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorType::Registry => "registry",
            ActorType::Session => "session",
        }
    }

    /// Returns the warning threshold for this actor type.
    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            ActorType::Registry => REGISTRY_MAILBOX_WARNING,
            ActorType::Session => SESSION_MAILBOX_WARNING,
        }
    }

    /// Returns the normal threshold for this actor type.
    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            ActorType::Registry => REGISTRY_MAILBOX_NORMAL,
            ActorType::Session => SESSION_MAILBOX_NORMAL,
        }
    }
}

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Mailbox monitor for tracking queue depth.
#[derive(Debug)]
pub struct MailboxMonitor {
    actor_type: ActorType,
    /// Actor identifier (rc_id or session_id).
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    /// Create a new mailbox monitor for the given actor.
    #[must_use]
    pub fn new(actor_type: ActorType, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;

        let mut current_peak = self.peak_depth.load(Ordering::Relaxed);
        while new_depth > current_peak {
            match self.peak_depth.compare_exchange_weak(
                current_peak,
                new_depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }

        let level = self.level_for_depth(new_depth);
        if level == MailboxLevel::Critical {
            warn!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = new_depth,
                threshold = self.actor_type.warning_threshold(),
                "Mailbox depth critical"
            );
        } else if level == MailboxLevel::Warning && new_depth == self.actor_type.normal_threshold()
        {
            // Log once when crossing the warning threshold
            debug!(
                target: "rc.actor.mailbox",
                actor_type = self.actor_type.as_str(),
                actor_id = %self.actor_id,
                depth = new_depth,
                "Mailbox depth elevated"
            );
        }
    }

    /// Record a message being removed from the mailbox (processed).
    pub fn record_dequeue(&self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current mailbox depth.
    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Peak mailbox depth observed.
    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    /// Total messages processed.
    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth >= self.actor_type.warning_threshold() {
            MailboxLevel::Critical
        } else if depth >= self.actor_type.normal_threshold() {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Shared counters across the actor system.
#[derive(Debug)]
pub struct ActorMetrics {
    sessions_started: AtomicU64,
    sessions_stopped: AtomicU64,
    sessions_failed: AtomicU64,
    active_sessions: AtomicUsize,
    messages_processed: AtomicU64,
    session_panics: AtomicU64,
}

/// Point-in-time view of [`ActorMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorMetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_stopped: u64,
    pub sessions_failed: u64,
    pub active_sessions: usize,
    pub messages_processed: u64,
    pub session_panics: u64,
}

impl ActorMetrics {
    /// Create shared metrics.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions_started: AtomicU64::new(0),
            sessions_stopped: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            active_sessions: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            session_panics: AtomicU64::new(0),
        })
    }

    /// A session was registered.
    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// A session was removed via explicit stop or shutdown.
    pub fn session_stopped(&self) {
        self.sessions_stopped.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// A session was removed because its recorder reported an error.
    pub fn session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// A message was processed by some actor.
    pub fn record_message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A session actor task panicked.
    pub fn record_panic(&self) {
        self.session_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Live session count.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> ActorMetricsSnapshot {
        ActorMetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_stopped: self.sessions_stopped.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            session_panics: self.session_panics.load(Ordering::Relaxed),
        }
    }
}
