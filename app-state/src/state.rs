use std::collections::BTreeMap;
use std::mem;

use data_outfit::{Outfit, OutfitId};

use crate::GUEST_FREE_LIMIT;

/// The complete in-memory application state.
///
/// One instance is owned by a [`StateStore`](crate::store::StateStore) and
/// every observable value lives here. Only the subset described in
/// [`persist`](crate::persist) survives a restart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    /// Uploaded user photo as a data URI.
    pub user_photo: Option<String>,
    /// Outfit currently selected for try-on.
    pub current_outfit: Option<Outfit>,
    /// Outfit catalog, loaded once per session by the caller.
    pub outfits: Vec<Outfit>,
    /// Outfits marked as favorite, in first-marked order, each at most once.
    pub favorites: Vec<OutfitId>,
    /// Generated composites keyed by outfit, valid only for the photo they
    /// were generated from.
    pub processed_images: BTreeMap<OutfitId, String>,
    /// Try-ons performed by a guest since the last reset.
    pub guest_try_ons: u32,
    pub show_share_modal: bool,
    pub show_sign_up_modal: bool,
    /// Set when a freshly generated composite lands in the closet, cleared
    /// when the closet is viewed.
    pub has_new_closet_item: bool,
    pub is_loading: bool,
}

impl AppState {
    /// Replace the user photo and drop every composite generated from the
    /// previous one. Both changes belong to the same update.
    pub fn set_user_photo(&mut self, photo: Option<String>) {
        self.user_photo = photo;
        self.processed_images.clear();
    }

    /// Add the outfit to favorites, or remove it if already present.
    pub fn toggle_favorite(&mut self, id: OutfitId) {
        if let Some(pos) = self.favorites.iter().position(|f| *f == id) {
            self.favorites.remove(pos);
        } else {
            self.favorites.push(id);
        }
    }

    pub fn is_favorite(&self, id: &OutfitId) -> bool {
        self.favorites.contains(id)
    }

    /// Remember the composite generated for an outfit, replacing any
    /// previous one.
    pub fn cache_processed_image(&mut self, id: OutfitId, image: String) {
        self.processed_images.insert(id, image);
    }

    /// Composite cached for the outfit, if any.
    pub fn processed_image(&self, id: &OutfitId) -> Option<&String> {
        self.processed_images.get(id)
    }

    pub fn increment_guest_try_ons(&mut self) {
        self.guest_try_ons += 1;
    }

    pub fn reset_guest_try_ons(&mut self) {
        self.guest_try_ons = 0;
    }

    /// Whether the guest has used up the free try-ons.
    pub fn has_reached_free_limit(&self) -> bool {
        self.guest_try_ons >= GUEST_FREE_LIMIT
    }

    /// Return every session-identifying field to its default. The catalog
    /// is kept, it does not belong to the user session.
    pub fn reset(&mut self) {
        let outfits = mem::take(&mut self.outfits);
        *self = Self {
            outfits,
            ..Self::default()
        };
    }
}
