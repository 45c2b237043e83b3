//! Actor-based session management.
//!
//! The actor hierarchy:
//!
//! ```text
//! RecorderRegistryActor (singleton)
//!   |-- owns the session map and the root CancellationToken
//!   |-- spawns a setup task per start (storage + channel join)
//!   +-- SessionActor (per recording session)
//!         |-- owns the recorder handle and the mix layout
//!         +-- event forwarder task (recorder events -> messages)
//! ```
//!
//! All communication is message passing over `tokio::sync::mpsc`, with
//! `oneshot` reply channels for request-response. Cancellation flows down
//! parent-to-child tokens; recorder release happens in exactly one place,
//! the session actor's shutdown path.

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod session;

pub use messages::{RegistryStatus, SessionInfo, SessionState};
pub use metrics::{ActorMetrics, ActorMetricsSnapshot};
pub use registry::RecorderRegistryHandle;
pub use session::SessionActorHandle;
