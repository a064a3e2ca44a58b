use std::sync::Arc;

use async_trait::async_trait;

use app_error::Result;
use data_outfit::Outfit;

use crate::store::StateStore;

/// Produces a composite of the user photo wearing an outfit.
///
/// Implementations call out to the image generation backend. The overlay
/// layer treats them as slow and fallible; a failed render is reported,
/// never propagated.
#[async_trait]
pub trait OutfitRenderer: Send + Sync {
    /// Render `outfit` over `photo` and return the composite as a data URI.
    async fn render(&self, photo: &str, outfit: &Outfit) -> Result<String>;
}

/// Outcome of applying an outfit.
#[derive(Debug, Clone, PartialEq)]
pub enum TryOn {
    /// A new composite was generated and cached.
    Generated(String),
    /// The composite for this outfit was served from the cache.
    Cached(String),
    /// No user photo is set.
    MissingPhoto,
    /// The guest has used up the free try-ons.
    FreeLimitReached,
    /// The renderer failed, the cause has been logged.
    Failed,
}

/// Applies outfits over the user photo, caching one composite per outfit.
pub struct OutfitOverlay {
    store: Arc<StateStore>,
    renderer: Arc<dyn OutfitRenderer>,
}

impl OutfitOverlay {
    pub fn new(
        store: Arc<StateStore>,
        renderer: Arc<dyn OutfitRenderer>,
    ) -> Self {
        Self { store, renderer }
    }

    /// Apply `outfit` over the current photo.
    ///
    /// Serves the cached composite when one exists for this outfit, unless
    /// `force_refresh` asks for a regeneration. The loading flag is raised
    /// for the duration of a render.
    pub async fn apply_outfit(
        &self,
        outfit: &Outfit,
        force_refresh: bool,
    ) -> TryOn {
        let photo = match self.store.snapshot().user_photo {
            Some(photo) => photo,
            None => return TryOn::MissingPhoto,
        };

        if !force_refresh {
            if let Some(cached) = self.store.processed_image(&outfit.id) {
                log::debug!("overlay: cache hit for {}", outfit.id);
                return TryOn::Cached(cached);
            }
        }

        self.store.set_loading(true);
        let rendered = self.renderer.render(&photo, outfit).await;
        self.store.set_loading(false);

        match rendered {
            Ok(image) => {
                // A render straddling a photo change caches the composite
                // it produced; the next photo change clears it again
                self.store
                    .cache_processed_image(outfit.id.clone(), image.clone());
                TryOn::Generated(image)
            }
            Err(err) => {
                log::error!(
                    "overlay: rendering {} failed: {}",
                    outfit.id,
                    err
                );
                TryOn::Failed
            }
        }
    }

    /// Run the guest try-on flow for `outfit`.
    ///
    /// The outfit becomes current right away, so the selection is visible
    /// even when the request is turned away. A missing photo turns it
    /// away quietly; only then does the free-limit gate run and raise
    /// the sign-up modal. Every shown result counts against the free
    /// limit, cached ones included; a freshly generated composite also
    /// marks the closet as updated.
    pub async fn try_on(
        &self,
        outfit: &Outfit,
        force_refresh: bool,
    ) -> TryOn {
        self.store.set_current_outfit(Some(outfit.clone()));

        if self.store.snapshot().user_photo.is_none() {
            return TryOn::MissingPhoto;
        }

        if self.store.has_reached_free_limit() {
            self.store.set_show_sign_up_modal(true);
            return TryOn::FreeLimitReached;
        }

        let outcome = self.apply_outfit(outfit, force_refresh).await;
        match &outcome {
            TryOn::Generated(_) => {
                // The gate above ran before the render, two overlapping
                // requests can each pass with one try-on left; the counter
                // records both completions
                self.store.increment_guest_try_ons();
                self.store.set_has_new_closet_item(true);
            }
            TryOn::Cached(_) => {
                self.store.increment_guest_try_ons();
            }
            _ => {}
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;

    use app_error::Result;
    use data_outfit::{Outfit, OutfitId};
    use kv_storage::memory::MemoryStorage;

    use super::{OutfitOverlay, OutfitRenderer, TryOn};
    use crate::store::StateStore;

    fn outfit(id: &str) -> Outfit {
        Outfit::new(OutfitId::new(id), id.to_uppercase(), "https://img")
    }

    fn store_with_photo() -> Arc<StateStore> {
        let store = StateStore::new(Arc::new(MemoryStorage::new()));
        store.set_user_photo(Some("data:image/jpeg;base64,AAAA".to_owned()));
        Arc::new(store)
    }

    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl CountingRenderer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OutfitRenderer for CountingRenderer {
        async fn render(
            &self,
            _photo: &str,
            outfit: &Outfit,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("data:image/png;base64,composite-{}", outfit.id))
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl OutfitRenderer for FailingRenderer {
        async fn render(
            &self,
            _photo: &str,
            _outfit: &Outfit,
        ) -> Result<String> {
            Err(anyhow::anyhow!("backend unavailable").into())
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_apply_without_photo() {
        let store = Arc::new(StateStore::new(Arc::new(MemoryStorage::new())));
        let renderer = CountingRenderer::new();
        let overlay = OutfitOverlay::new(store, renderer.clone());

        let outcome = overlay.apply_outfit(&outfit("o1"), false).await;
        assert_eq!(outcome, TryOn::MissingPhoto);
        assert_eq!(renderer.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_apply_caches_and_reuses() {
        let store = store_with_photo();
        let renderer = CountingRenderer::new();
        let overlay =
            OutfitOverlay::new(store.clone(), renderer.clone());
        let o1 = outfit("o1");

        let first = overlay.apply_outfit(&o1, false).await;
        let image = match first {
            TryOn::Generated(image) => image,
            other => panic!("Expected a generated composite, got {:?}", other),
        };
        assert_eq!(renderer.calls(), 1);
        assert_eq!(store.processed_image(&o1.id), Some(image.clone()));

        // The second apply must not touch the renderer
        let second = overlay.apply_outfit(&o1, false).await;
        assert_eq!(second, TryOn::Cached(image));
        assert_eq!(renderer.calls(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_force_refresh_bypasses_cache() {
        let store = store_with_photo();
        let renderer = CountingRenderer::new();
        let overlay = OutfitOverlay::new(store, renderer.clone());
        let o1 = outfit("o1");

        overlay.apply_outfit(&o1, false).await;
        let again = overlay.apply_outfit(&o1, true).await;
        assert!(matches!(again, TryOn::Generated(_)));
        assert_eq!(renderer.calls(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_render_failure_is_reported() {
        let store = store_with_photo();
        let overlay =
            OutfitOverlay::new(store.clone(), Arc::new(FailingRenderer));

        let outcome = overlay.apply_outfit(&outfit("o1"), false).await;
        assert_eq!(outcome, TryOn::Failed);
        assert!(!store.snapshot().is_loading);
        assert_eq!(store.processed_image(&OutfitId::new("o1")), None);
    }

    #[test_log::test(tokio::test)]
    async fn test_try_on_counts_every_shown_result() {
        let store = store_with_photo();
        let renderer = CountingRenderer::new();
        let overlay =
            OutfitOverlay::new(store.clone(), renderer.clone());
        let o1 = outfit("o1");

        let first = overlay.try_on(&o1, false).await;
        assert!(matches!(first, TryOn::Generated(_)));
        assert_eq!(store.snapshot().guest_try_ons, 1);
        assert!(store.snapshot().has_new_closet_item);

        // A cached result also consumes a try-on
        let second = overlay.try_on(&o1, false).await;
        assert!(matches!(second, TryOn::Cached(_)));
        assert_eq!(store.snapshot().guest_try_ons, 2);
        assert_eq!(renderer.calls(), 1);

        let third = overlay.try_on(&outfit("o2"), false).await;
        assert_eq!(third, TryOn::FreeLimitReached);
        assert_eq!(store.snapshot().guest_try_ons, 2);
        assert!(store.snapshot().show_sign_up_modal);
        assert_eq!(renderer.calls(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_try_on_selects_outfit_even_when_gated() {
        let store = store_with_photo();
        store.increment_guest_try_ons();
        store.increment_guest_try_ons();
        let renderer = CountingRenderer::new();
        let overlay =
            OutfitOverlay::new(store.clone(), renderer.clone());
        let o9 = outfit("o9");

        let outcome = overlay.try_on(&o9, false).await;
        assert_eq!(outcome, TryOn::FreeLimitReached);
        assert_eq!(
            store.snapshot().current_outfit.map(|o| o.id),
            Some(o9.id)
        );
        assert_eq!(renderer.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_try_on_without_photo_never_gates() {
        let store = Arc::new(StateStore::new(Arc::new(MemoryStorage::new())));
        store.increment_guest_try_ons();
        store.increment_guest_try_ons();
        let renderer = CountingRenderer::new();
        let overlay =
            OutfitOverlay::new(store.clone(), renderer.clone());
        let o1 = outfit("o1");

        // Even an exhausted guest is asked for a photo, not to sign up
        let outcome = overlay.try_on(&o1, false).await;
        assert_eq!(outcome, TryOn::MissingPhoto);
        assert!(!store.snapshot().show_sign_up_modal);
        assert_eq!(
            store.snapshot().current_outfit.map(|o| o.id),
            Some(o1.id)
        );
        assert_eq!(renderer.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_try_on_does_not_count() {
        let store = store_with_photo();
        let overlay =
            OutfitOverlay::new(store.clone(), Arc::new(FailingRenderer));

        let outcome = overlay.try_on(&outfit("o1"), false).await;
        assert_eq!(outcome, TryOn::Failed);
        assert_eq!(store.snapshot().guest_try_ons, 0);
        assert!(!store.snapshot().has_new_closet_item);
    }
}
