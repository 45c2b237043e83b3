//! Mock storage provisioner that never touches the filesystem.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use recording_controller::storage::StorageProvisioner;
use recording_controller::RecorderError;

#[derive(Debug, Default)]
struct MockStorageInner {
    fail_next: bool,
    allocated: Vec<String>,
}

/// In-memory [`StorageProvisioner`] returning synthetic paths.
#[derive(Debug, Default)]
pub struct MockStorage {
    inner: Mutex<MockStorageInner>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `allocate` call fail.
    pub fn fail_next(&self) {
        self.inner.lock().unwrap().fail_next = true;
    }

    /// Session ids allocated so far, in call order.
    pub fn allocated(&self) -> Vec<String> {
        self.inner.lock().unwrap().allocated.clone()
    }
}

#[async_trait]
impl StorageProvisioner for MockStorage {
    async fn allocate(&self, session_id: &str) -> Result<PathBuf, RecorderError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.fail_next {
            inner.fail_next = false;
            return Err(RecorderError::Storage(
                "simulated storage failure".to_string(),
            ));
        }

        inner.allocated.push(session_id.to_string());
        Ok(PathBuf::from("mock-storage").join(session_id))
    }
}
