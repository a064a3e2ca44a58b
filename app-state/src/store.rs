use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;

use data_outfit::{Outfit, OutfitId};
use kv_storage::snapshot_storage::SnapshotStorage;

use crate::persist;
use crate::state::AppState;
use crate::SNAPSHOT_KEY;

/// How the initial state was obtained when the store was opened.
#[derive(Debug, Clone, PartialEq)]
pub enum RehydrationReport {
    /// A persisted snapshot was found and merged.
    Restored,
    /// Nothing was stored yet, defaults are in effect.
    Empty,
    /// A snapshot was found but could not be used, defaults are in effect.
    Discarded { reason: String },
}

/// Snapshot writes still in flight, awaitable for shutdown and tests.
struct Pending {
    count: watch::Sender<usize>,
}

impl Pending {
    fn new() -> Self {
        Self {
            count: watch::channel(0).0,
        }
    }

    fn begin(&self) {
        self.count.send_modify(|count| *count += 1);
    }

    fn finish(&self) {
        self.count.send_modify(|count| *count -= 1);
    }

    async fn quiesce(&self) {
        let mut observed = self.count.subscribe();
        // The sender lives in self, waiting cannot fail
        let _ = observed.wait_for(|count| *count == 0).await;
    }
}

/// Owns the application state and publishes every change to subscribers.
///
/// Each mutation is one atomic update on the watch channel, so a compound
/// change (a photo replacement clearing the composite cache, a full reset)
/// is a single observable transition. Mutations that touch persisted fields
/// schedule one fire-and-forget write of the serialized snapshot to the
/// injected storage; the in-memory state stays authoritative and the
/// durable copy converges, last completed write wins.
pub struct StateStore {
    publisher: watch::Sender<AppState>,
    storage: Arc<dyn SnapshotStorage>,
    runtime: Handle,
    pending: Arc<Pending>,
    rehydration: RehydrationReport,
}

impl StateStore {
    /// Create a store with default state, without consulting the storage.
    ///
    /// Must be called inside a tokio runtime. The store keeps the runtime
    /// handle and spawns its snapshot writes onto it, so mutations may
    /// later come from any thread.
    pub fn new(storage: Arc<dyn SnapshotStorage>) -> Self {
        Self::with_state(
            AppState::default(),
            storage,
            RehydrationReport::Empty,
        )
    }

    /// Create a store, restoring the persisted snapshot when one exists.
    ///
    /// An unusable snapshot is discarded with a log entry and the store
    /// starts from defaults. Rehydration never fails.
    pub async fn open(storage: Arc<dyn SnapshotStorage>) -> Self {
        let (state, rehydration) = match storage.get_item(SNAPSHOT_KEY).await
        {
            Some(raw) => match persist::decode(&raw) {
                Ok(state) => {
                    log::debug!("state: snapshot restored");
                    (state, RehydrationReport::Restored)
                }
                Err(err) => {
                    log::warn!(
                        "state: discarding unusable snapshot: {}",
                        err
                    );
                    (
                        AppState::default(),
                        RehydrationReport::Discarded {
                            reason: err.to_string(),
                        },
                    )
                }
            },
            None => (AppState::default(), RehydrationReport::Empty),
        };
        Self::with_state(state, storage, rehydration)
    }

    fn with_state(
        state: AppState,
        storage: Arc<dyn SnapshotStorage>,
        rehydration: RehydrationReport,
    ) -> Self {
        let (publisher, _) = watch::channel(state);
        Self {
            publisher,
            storage,
            runtime: Handle::current(),
            pending: Arc::new(Pending::new()),
            rehydration,
        }
    }

    /// How the initial state was obtained.
    pub fn rehydration(&self) -> &RehydrationReport {
        &self.rehydration
    }

    /// A receiver observing the current state and every later update.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.publisher.subscribe()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> AppState {
        self.publisher.borrow().clone()
    }

    /// Await completion of the snapshot writes scheduled so far.
    pub async fn flush(&self) {
        self.pending.quiesce().await;
    }

    /// Drop the persisted snapshot from storage. In-memory state is kept
    /// and the next persisting mutation writes a fresh snapshot.
    pub async fn clear_saved(&self) {
        self.storage.remove_item(SNAPSHOT_KEY).await;
    }

    /// Replace the user photo. Composites generated from the previous photo
    /// are dropped in the same update.
    pub fn set_user_photo(&self, photo: Option<String>) {
        self.update(|state| state.set_user_photo(photo));
    }

    pub fn set_current_outfit(&self, outfit: Option<Outfit>) {
        self.update(|state| state.current_outfit = outfit);
    }

    /// Replace the whole catalog. Session-only, nothing is written.
    pub fn set_outfits(&self, outfits: Vec<Outfit>) {
        self.update_transient(|state| state.outfits = outfits);
    }

    /// Append one outfit to the catalog.
    pub fn add_outfit(&self, outfit: Outfit) {
        self.update_transient(|state| state.outfits.push(outfit));
    }

    pub fn toggle_favorite(&self, id: OutfitId) {
        self.update(|state| state.toggle_favorite(id));
    }

    pub fn is_favorite(&self, id: &OutfitId) -> bool {
        self.publisher.borrow().is_favorite(id)
    }

    pub fn cache_processed_image(&self, id: OutfitId, image: String) {
        self.update(|state| state.cache_processed_image(id, image));
    }

    pub fn processed_image(&self, id: &OutfitId) -> Option<String> {
        self.publisher.borrow().processed_image(id).cloned()
    }

    pub fn increment_guest_try_ons(&self) {
        self.update(AppState::increment_guest_try_ons);
    }

    pub fn reset_guest_try_ons(&self) {
        self.update(AppState::reset_guest_try_ons);
    }

    pub fn has_reached_free_limit(&self) -> bool {
        self.publisher.borrow().has_reached_free_limit()
    }

    pub fn set_show_share_modal(&self, show: bool) {
        self.update_transient(|state| state.show_share_modal = show);
    }

    pub fn set_show_sign_up_modal(&self, show: bool) {
        self.update_transient(|state| state.show_sign_up_modal = show);
    }

    pub fn set_has_new_closet_item(&self, value: bool) {
        self.update(|state| state.has_new_closet_item = value);
    }

    pub fn set_loading(&self, loading: bool) {
        self.update_transient(|state| state.is_loading = loading);
    }

    /// Reset the session in one atomic update, see [`AppState::reset`].
    pub fn reset_state(&self) {
        self.update(AppState::reset);
    }

    /// Apply a mutation of persisted fields: publish one snapshot and
    /// schedule one storage write.
    fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut AppState),
    {
        self.publisher.send_modify(mutate);
        self.persist();
    }

    /// Apply a mutation of session-only fields: publish one snapshot,
    /// nothing is written.
    fn update_transient<F>(&self, mutate: F)
    where
        F: FnOnce(&mut AppState),
    {
        self.publisher.send_modify(mutate);
    }

    fn persist(&self) {
        let payload = match persist::encode(&self.publisher.borrow()) {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("state: failed to encode snapshot: {}", err);
                return;
            }
        };

        let storage = Arc::clone(&self.storage);
        let pending = Arc::clone(&self.pending);
        pending.begin();
        self.runtime.spawn(async move {
            storage.set_item(SNAPSHOT_KEY, &payload).await;
            pending.finish();
        });
    }
}
