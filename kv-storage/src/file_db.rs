use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};

use app_error::{AppError, Result};

use crate::atomic::temp_and_move;
use crate::snapshot_storage::SnapshotStorage;

/*
Note on `FileDb` Versioning:

The whole database is a single JSON document `{version, entries}`. The
version field is checked on every read; a document written by a different
schema is treated as absent and replaced by the next successful write.
*/
const DB_VERSION: i32 = 1;

/// A snapshot storage backed by a single JSON file on disk.
///
/// The database file is created lazily on first use and never rewritten by
/// opening alone. Every operation runs a full read-mutate-replace cycle
/// under an internal lock, so overlapping callers cannot interleave within
/// one instance; across instances the last completed write wins. The file
/// is replaced by writing a temporary sibling and renaming it, a crash
/// never leaves a torn document.
///
/// Failures stay inside: the [`SnapshotStorage`] surface degrades reads to
/// `None` and writes to a no-op, logging the cause under the database label.
pub struct FileDb {
    label: String,
    path: PathBuf,
    txn: Mutex<DbState>,
}

/// State guarded by the transaction lock.
struct DbState {
    initialized: bool,
}

/// The serialized document of a [`FileDb`].
#[derive(Serialize, Deserialize)]
struct DbDocument {
    version: i32,
    entries: BTreeMap<String, String>,
}

impl DbDocument {
    fn empty() -> Self {
        Self {
            version: DB_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl FileDb {
    /// Create a database handle with a diagnostic label and file path.
    /// No disk access happens until the first operation.
    pub fn new(label: String, path: &Path) -> Self {
        Self {
            label,
            path: PathBuf::from(path),
            txn: Mutex::new(DbState { initialized: false }),
        }
    }

    /// Create the parent directories and an empty versioned document, but
    /// only when the database file does not exist yet. Ran once per handle,
    /// retried after a failure.
    async fn ensure_init(&self, txn: &mut DbState) -> Result<()> {
        if txn.initialized {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if !fs::try_exists(&self.path).await? {
            let doc = serde_json::to_string(&DbDocument::empty())?;
            temp_and_move(doc.as_bytes(), &self.path).await?;
            log::debug!(
                "db/{}: created empty database at {}",
                self.label,
                self.path.display()
            );
        }

        txn.initialized = true;
        Ok(())
    }

    async fn read_doc(&self) -> Result<DbDocument> {
        let content = fs::read_to_string(&self.path).await?;
        let doc: DbDocument =
            serde_json::from_str(&content).map_err(|err| {
                AppError::Storage(self.label.clone(), err.to_string())
            })?;
        if doc.version != DB_VERSION {
            return Err(AppError::Storage(
                self.label.clone(),
                format!(
                    "version mismatch: expected {}, got {}",
                    DB_VERSION, doc.version
                ),
            ));
        }
        Ok(doc)
    }

    async fn write_doc(&self, doc: &DbDocument) -> Result<()> {
        let data = serde_json::to_string(doc)?;
        temp_and_move(data.as_bytes(), &self.path).await?;
        Ok(())
    }

    async fn try_get(&self, key: &str) -> Result<Option<String>> {
        let mut txn = self.txn.lock().await;
        self.ensure_init(&mut txn).await?;

        let doc = self.read_doc().await?;
        Ok(doc.entries.get(key).cloned())
    }

    async fn try_set(&self, key: &str, value: &str) -> Result<()> {
        let mut txn = self.txn.lock().await;
        self.ensure_init(&mut txn).await?;

        let mut doc = match self.read_doc().await {
            Ok(doc) => doc,
            Err(err) => {
                log::debug!(
                    "db/{}: replacing unreadable database: {}",
                    self.label,
                    err
                );
                DbDocument::empty()
            }
        };
        doc.entries.insert(key.to_owned(), value.to_owned());
        self.write_doc(&doc).await
    }

    async fn try_remove(&self, key: &str) -> Result<()> {
        let mut txn = self.txn.lock().await;
        self.ensure_init(&mut txn).await?;

        let mut doc = match self.read_doc().await {
            Ok(doc) => doc,
            Err(_) => return Ok(()),
        };
        if doc.entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_doc(&doc).await
    }
}

#[async_trait]
impl SnapshotStorage for FileDb {
    async fn get_item(&self, key: &str) -> Option<String> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(err) => {
                log::error!("db/{}: read failed: {}", self.label, err);
                None
            }
        }
    }

    async fn set_item(&self, key: &str, value: &str) {
        if let Err(err) = self.try_set(key, value).await {
            log::error!("db/{}: write failed: {}", self.label, err);
        }
    }

    async fn remove_item(&self, key: &str) {
        if let Err(err) = self.try_remove(key).await {
            log::error!("db/{}: remove failed: {}", self.label, err);
        }
    }
}
