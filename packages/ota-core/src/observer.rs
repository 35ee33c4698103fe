use async_trait::async_trait;
use ota_update::UpdateRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ACTION_CHECK_FINISHED: &str = "com.aospextended.ota.action.UPDATE_CHECK_FINISHED";

/// Completion event of an update check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFinished {
    /// Total amount of found updates
    pub update_count: usize,
    /// Updates newer than what is installed
    pub real_update_count: usize,
    /// Updates found for the first time, counted like `real_update_count`
    pub new_update_count: usize,
}

impl CheckFinished {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Counts over records already evaluated against the installed build.
    pub fn from_records(records: &[UpdateRecord]) -> Self {
        let real = records
            .iter()
            .filter(|record| record.is_newer_than_installed())
            .count();
        Self {
            update_count: records.len(),
            real_update_count: real,
            new_update_count: real,
        }
    }
}

#[async_trait]
pub trait CheckObserver: Send + Sync {
    async fn on_check_finished(&self, event: &CheckFinished);
}

#[derive(Clone, Default)]
pub struct ObserverManager {
    observers: Arc<Mutex<Vec<Arc<dyn CheckObserver>>>>,
}

impl ObserverManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, observer: Arc<dyn CheckObserver>) {
        self.observers.lock().await.push(observer);
    }

    pub async fn clear(&self) {
        self.observers.lock().await.clear();
    }

    pub async fn notify_check_finished(&self, event: &CheckFinished) {
        let observers = self.observers.lock().await.clone();
        for observer in observers.iter() {
            observer.on_check_finished(event).await;
        }
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.lock().await.len()
    }
}
