use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use app_error::{AppError, Result};
use data_outfit::{Outfit, OutfitId};

use crate::state::AppState;

/// Schema of the persisted snapshot document. A mismatch reads as no prior
/// state.
const PERSIST_VERSION: i32 = 1;

/// The subset of [`AppState`] that survives a restart.
///
/// Kept as its own struct so the stored shape stays explicit: adding a field
/// to [`AppState`] does not silently grow the snapshot. The document is
/// camelCase like the other serialized shapes of the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    version: i32,
    pub favorites: Vec<OutfitId>,
    pub user_photo: Option<String>,
    pub guest_try_ons: u32,
    pub current_outfit: Option<Outfit>,
    pub processed_images: BTreeMap<OutfitId, String>,
    pub has_new_closet_item: bool,
}

/// Extract the persisted subset of the state.
pub fn to_persisted(state: &AppState) -> PersistedState {
    PersistedState {
        version: PERSIST_VERSION,
        favorites: state.favorites.clone(),
        user_photo: state.user_photo.clone(),
        guest_try_ons: state.guest_try_ons,
        current_outfit: state.current_outfit.clone(),
        processed_images: state.processed_images.clone(),
        has_new_closet_item: state.has_new_closet_item,
    }
}

/// Rebuild application state from a persisted snapshot. Fields that are not
/// persisted take their defaults.
pub fn from_persisted(persisted: PersistedState) -> AppState {
    AppState {
        favorites: persisted.favorites,
        user_photo: persisted.user_photo,
        guest_try_ons: persisted.guest_try_ons,
        current_outfit: persisted.current_outfit,
        processed_images: persisted.processed_images,
        has_new_closet_item: persisted.has_new_closet_item,
        ..AppState::default()
    }
}

/// Serialize the persisted subset of `state` for storage.
pub(crate) fn encode(state: &AppState) -> Result<String> {
    Ok(serde_json::to_string(&to_persisted(state))?)
}

/// Decode a stored snapshot back into application state.
pub(crate) fn decode(raw: &str) -> Result<AppState> {
    let persisted: PersistedState = serde_json::from_str(raw)?;
    if persisted.version != PERSIST_VERSION {
        return Err(AppError::Rehydration(format!(
            "snapshot version mismatch: expected {}, got {}",
            PERSIST_VERSION, persisted.version
        )));
    }
    Ok(from_persisted(persisted))
}

#[cfg(test)]
mod tests {
    use data_outfit::{Outfit, OutfitId};

    use super::{decode, encode, from_persisted, to_persisted};
    use crate::state::AppState;

    fn populated_state() -> AppState {
        let mut state = AppState::default();
        state.set_user_photo(Some("data:image/jpeg;base64,AAAA".to_owned()));
        state.current_outfit =
            Some(Outfit::new(OutfitId::new("o1"), "Linen", "https://img"));
        state.toggle_favorite(OutfitId::new("o1"));
        state.toggle_favorite(OutfitId::new("o2"));
        state.cache_processed_image(
            OutfitId::new("o1"),
            "data:image/png;base64,BBBB".to_owned(),
        );
        state.guest_try_ons = 1;
        state.has_new_closet_item = true;
        state
    }

    #[test]
    fn test_roundtrip_preserves_persisted_fields() {
        let mut state = populated_state();
        // Session-only fields must not survive the roundtrip
        state.outfits = vec![Outfit::new(
            OutfitId::new("catalog"),
            "Catalog",
            "https://img",
        )];
        state.is_loading = true;
        state.show_share_modal = true;
        state.show_sign_up_modal = true;

        let restored = from_persisted(to_persisted(&state));

        assert_eq!(restored.favorites, state.favorites);
        assert_eq!(restored.user_photo, state.user_photo);
        assert_eq!(restored.guest_try_ons, state.guest_try_ons);
        assert_eq!(restored.current_outfit, state.current_outfit);
        assert_eq!(restored.processed_images, state.processed_images);
        assert_eq!(restored.has_new_closet_item, state.has_new_closet_item);

        assert!(restored.outfits.is_empty());
        assert!(!restored.is_loading);
        assert!(!restored.show_share_modal);
        assert!(!restored.show_sign_up_modal);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let state = populated_state();
        let raw = encode(&state).expect("Failed to encode snapshot");
        let restored = decode(&raw).expect("Failed to decode snapshot");
        assert_eq!(restored.favorites, state.favorites);
        assert_eq!(restored.processed_images, state.processed_images);
    }

    #[test]
    fn test_document_is_camel_case() {
        let raw =
            encode(&populated_state()).expect("Failed to encode snapshot");
        assert!(raw.contains("\"userPhoto\""));
        assert!(raw.contains("\"guestTryOns\""));
        assert!(raw.contains("\"processedImages\""));
        assert!(raw.contains("\"hasNewClosetItem\""));
    }

    #[test]
    fn test_decode_rejects_version_mismatch() {
        let raw = r#"{
            "version": 99,
            "favorites": [],
            "userPhoto": null,
            "guestTryOns": 0,
            "currentOutfit": null,
            "processedImages": {},
            "hasNewClosetItem": false
        }"#;
        assert!(decode(raw).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not a snapshot").is_err());
        assert!(decode("{}").is_err());
    }
}
