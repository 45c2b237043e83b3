//! # RC Test Utilities
//!
//! Shared test utilities for the Recording Controller.
//!
//! This crate provides mock implementations for isolated testing without a
//! real recording SDK or filesystem side effects.
//!
//! ## Modules
//!
//! - `mock_recorder` - Mock channel recorder, probe, event injector, factory
//! - `mock_storage` - In-memory storage provisioner
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rc_test_utils::{MockRecorderFactory, MockStorage};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let factory = Arc::new(MockRecorderFactory::new());
//!     let storage = Arc::new(MockStorage::new());
//!
//!     // Hand both to the registry under test, then drive events:
//!     // factory.created()[0].injector.participant_joined(42).await;
//! }
//! ```

pub mod mock_recorder;
pub mod mock_storage;

// Re-export commonly used items
pub use mock_recorder::*;
pub use mock_storage::*;
