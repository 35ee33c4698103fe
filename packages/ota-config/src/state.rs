use async_trait::async_trait;
use ota_update::UpdateRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

pub const STATE_FILE_NAME: &str = "state.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted outcome of the most recent update checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckState {
    /// Epoch millis of the last check whose fetch succeeded
    #[serde(default)]
    pub last_update_check: Option<i64>,
    #[serde(default)]
    pub boot_check_completed: bool,
    /// Last known update list
    #[serde(default)]
    pub updates: Vec<UpdateRecord>,
}

impl CheckState {
    pub fn record_success(&mut self, updates: &[UpdateRecord], now_millis: i64) {
        self.last_update_check = Some(now_millis);
        self.boot_check_completed = true;
        self.updates = updates.to_vec();
    }
}

/// Key-value style storage for [`CheckState`], single writer by contract.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<CheckState, StateError>;
    async fn save(&self, state: &CheckState) -> Result<(), StateError>;
}

/// JSON document on disk.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<CheckState, StateError> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CheckState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &CheckState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<CheckState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: CheckState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<CheckState, StateError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &CheckState) -> Result<(), StateError> {
        *self.state.lock().await = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> UpdateRecord {
        UpdateRecord::from_json(&json!({
            "filename": "update.zip",
            "filesize": 123,
            "build_date": "2024-01-01",
            "md5": "abc",
            "url": "http://x/u.zip",
            "changelog": "fixes"
        }))
        .unwrap()
    }

    #[test]
    fn test_record_success() {
        let mut state = CheckState::default();
        state.record_success(&[record()], 1_700_000_000_000);
        assert_eq!(state.last_update_check, Some(1_700_000_000_000));
        assert!(state.boot_check_completed);
        assert_eq!(state.updates.len(), 1);

        state.record_success(&[], 1_700_000_000_001);
        assert!(state.boot_check_completed);
        assert!(state.updates.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::in_dir(dir.path());
        assert_eq!(store.load().await.unwrap(), CheckState::default());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::in_dir(&dir.path().join("nested"));
        let mut state = CheckState::default();
        state.record_success(&[record()], 42);
        store.save(&state).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.last_update_check, Some(42));
        assert!(loaded.boot_check_completed);
        assert_eq!(loaded.updates[0].file_name(), "update.zip");
        assert_eq!(loaded.updates[0].changelog(), "fixes");
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::in_dir(dir.path());
        tokio::fs::write(store.path(), b"garbage").await.unwrap();
        assert!(matches!(store.load().await, Err(StateError::Json(_))));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStateStore::new();
        let mut state = store.load().await.unwrap();
        assert!(!state.boot_check_completed);
        state.boot_check_completed = true;
        store.save(&state).await.unwrap();
        assert!(store.load().await.unwrap().boot_check_completed);
    }
}
