use async_trait::async_trait;

/// Asynchronous key-value storage for serialized application snapshots.
///
/// This is the already-degraded surface the state layer consumes:
/// implementations swallow their own failures. A failed read resolves to
/// `None` and a failed write resolves without effect, with the cause going
/// to the log. Callers treat durability as best-effort and keep the
/// in-memory state authoritative.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Look up the value stored under `key`. Resolves to `None` when the
    /// key is absent or the storage is unavailable.
    async fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str);

    /// Delete the value stored under `key`, if any.
    async fn remove_item(&self, key: &str);
}
