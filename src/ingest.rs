use std::sync::Arc;
use tracing::{error, info, warn};

use crate::enhance::{Captioners, Stylizers, CAPTION_PROMPT, WEBTOON_PROMPT};
use crate::models::{MediaFiles, MediaPost};
use crate::repo::MediaPostRepo;
use crate::storage::{available_key, basename, extension_of, MediaStore};

pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];

pub const MEDIA_DIR: &str = "media_posts";
pub const ORIGINALS_DIR: &str = "media_posts/originals";

pub fn is_allowed_image(key: &str) -> bool {
    extension_of(key)
        .map(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Save hooks for media posts. Every external failure is logged and
/// swallowed; neither hook ever fails the save.
pub struct IngestPipeline {
    store: Arc<dyn MediaStore>,
    stylizers: Stylizers,
    captioners: Captioners,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn MediaStore>, stylizers: Stylizers, captioners: Captioners) -> Self {
        Self { store, stylizers, captioners }
    }

    /// Runs before the row is written. Preserves the upload in the original
    /// slot and, when the post asks for it, swaps the primary slot for the
    /// stylized copy. No-op once an original is recorded.
    pub async fn before_save<P: MediaFiles + Send>(&self, post: &mut P) {
        if post.file().is_empty() || post.original_file().is_some() {
            return;
        }
        let file = post.file().to_string();
        if !is_allowed_image(&file) {
            info!(title = post.title(), file = %file, "not an image; skipping transform");
            return;
        }

        let original = match self.store.get(&file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(title = post.title(), file = %file, error = %e, "cannot read upload; skipping transform");
                return;
            }
        };

        let original_name = format!("original_{}", basename(&file));
        match self.store_copy(ORIGINALS_DIR, &original_name, &original).await {
            Some(key) => {
                info!(title = post.title(), key = %key, "original preserved");
                post.set_original_file(key);
            }
            None => return,
        }

        if !post.apply_filter() {
            return;
        }

        let styled = match self.stylizers.run(&original, WEBTOON_PROMPT).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(title = post.title(), error = %e, "stylization failed; keeping original bytes");
                original
            }
        };
        let webtoon_name = format!("webtoon_{}", basename(&file));
        if let Some(key) = self.store_copy(MEDIA_DIR, &webtoon_name, &styled).await {
            info!(title = post.title(), key = %key, "primary slot replaced");
            post.set_file(key);
            if let Err(e) = self.store.delete(&file).await {
                warn!(file = %file, error = %e, "failed to remove superseded upload");
            }
        }
    }

    async fn store_copy(&self, dir: &str, name: &str, bytes: &[u8]) -> Option<String> {
        let key = match available_key(self.store.as_ref(), dir, name).await {
            Ok(k) => k,
            Err(e) => {
                error!(file = name, error = %e, "cannot allocate storage key");
                return None;
            }
        };
        match self.store.put(&key, bytes).await {
            Ok(()) => Some(key),
            Err(e) => {
                error!(key = %key, error = %e, "storage write failed");
                None
            }
        }
    }

    /// Runs after the row is written. Captions the (possibly stylized) image
    /// once and stores the text with a caption-only update.
    pub async fn after_save<R: MediaPostRepo + ?Sized>(&self, repo: &R, post: &mut MediaPost) {
        if post.ai_caption.as_deref().map(|c| !c.is_empty()).unwrap_or(false) {
            return;
        }
        if post.file.is_empty() || !is_allowed_image(&post.file) {
            return;
        }
        let bytes = match self.store.get(&post.file).await {
            Ok(b) => b,
            Err(e) => {
                error!(title = %post.title, file = %post.file, error = %e, "cannot read image for captioning");
                return;
            }
        };
        match self.captioners.run(&bytes, CAPTION_PROMPT).await {
            Ok(caption) => {
                info!(title = %post.title, "caption generated");
                match repo.set_media_caption(post.id, &caption).await {
                    Ok(()) => post.ai_caption = Some(caption),
                    Err(e) => error!(id = post.id, error = %e, "failed to store caption"),
                }
            }
            Err(e) => warn!(title = %post.title, error = %e, "captioning failed; leaving caption empty"),
        }
    }
}
