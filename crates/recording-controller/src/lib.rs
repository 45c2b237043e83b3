//! Recording Controller - concurrent live-channel recording sessions.
//!
//! Manages a registry of recording sessions, one per live channel. Each
//! session owns an external channel-recorder handle and a deterministic
//! video mix layout that it recomputes as participants come and go.
//!
//! # Architecture
//!
//! - [`actors`] - Registry and session actors (message-passing core)
//! - [`layout`] - Mix layout state machine (canvas, regions, join policy)
//! - [`recorder`] - Channel recorder capability boundary
//! - [`storage`] - Per-session storage provisioning
//! - [`config`] - Environment-driven configuration
//! - [`errors`] - Error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use recording_controller::actors::{ActorMetrics, RecorderRegistryHandle};
//! use recording_controller::config::Config;
//! use recording_controller::storage::DirStorageProvisioner;
//! # use recording_controller::recorder::RecorderFactory;
//!
//! # async fn run(factory: Arc<dyn RecorderFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let registry = RecorderRegistryHandle::new(
//!     config.rc_id,
//!     config.max_sessions,
//!     Arc::new(DirStorageProvisioner::new(config.output_root)),
//!     factory,
//!     ActorMetrics::new(),
//! );
//!
//! let info = registry
//!     .start(None, "app-id".to_string(), "channel".to_string())
//!     .await?;
//! registry.stop(info.session_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod actors;
pub mod config;
pub mod errors;
pub mod layout;
pub mod recorder;
pub mod storage;

pub use actors::RecorderRegistryHandle;
pub use errors::RecorderError;
pub use layout::{MixLayout, ParticipantId, Region};
pub use recorder::{ChannelContext, ChannelRecorder, RecorderEvent, RecorderFactory};
pub use storage::{DirStorageProvisioner, StorageProvisioner};
