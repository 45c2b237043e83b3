//! Session storage provisioning.
//!
//! The core only needs a directory per session to hand to the recorder's
//! join call; it never inspects the directory's contents afterwards.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::errors::RecorderError;

/// Allocates a per-session working directory.
#[async_trait]
pub trait StorageProvisioner: Send + Sync {
    /// Allocate a directory dedicated to `session_id`, creating any missing
    /// parents.
    async fn allocate(&self, session_id: &str) -> Result<PathBuf, RecorderError>;
}

/// Filesystem-backed provisioner: one subdirectory per session under a
/// fixed output root.
#[derive(Debug, Clone)]
pub struct DirStorageProvisioner {
    root: PathBuf,
}

impl DirStorageProvisioner {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageProvisioner for DirStorageProvisioner {
    async fn allocate(&self, session_id: &str) -> Result<PathBuf, RecorderError> {
        let path = self.root.join(session_id);
        tokio::fs::create_dir_all(&path).await.map_err(|e| {
            RecorderError::Storage(format!("failed to create {}: {e}", path.display()))
        })?;

        debug!(
            target: "rc.storage",
            session_id = %session_id,
            path = %path.display(),
            "Session storage allocated"
        );

        Ok(path)
    }
}
