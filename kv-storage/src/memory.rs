use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::snapshot_storage::SnapshotStorage;

/// An in-memory snapshot storage.
///
/// Backs tests and sessions without a durable location; contents live as
/// long as the process.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set_item(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
    }

    async fn remove_item(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}
