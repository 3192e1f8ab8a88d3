//! services/api/src/adapters/photos.rs
//!
//! Local filesystem implementation of the `PhotoStoreService` port. The
//! returned handle is the file name relative to the media root; the core
//! never sees bytes or paths.

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use casa_core::error::{CoreError, CoreResult};
use casa_core::ports::PhotoStoreService;

/// An adapter that stores photo bytes under a media directory.
#[derive(Clone)]
pub struct LocalPhotoStore {
    media_root: PathBuf,
}

impl LocalPhotoStore {
    pub fn new(media_root: PathBuf) -> Self {
        Self { media_root }
    }

    fn extension_for(content_type: &str) -> CoreResult<&'static str> {
        match content_type {
            "image/jpeg" => Ok("jpg"),
            "image/png" => Ok("png"),
            "image/webp" => Ok("webp"),
            other => Err(CoreError::Validation(format!(
                "Unsupported photo content type '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl PhotoStoreService for LocalPhotoStore {
    async fn store(&self, bytes: &[u8], content_type: &str) -> CoreResult<String> {
        let extension = Self::extension_for(content_type)?;
        let handle = format!("{}.{}", Uuid::new_v4(), extension);

        tokio::fs::create_dir_all(&self.media_root)
            .await
            .map_err(|e| CoreError::Infrastructure(format!("Media dir: {}", e)))?;
        tokio::fs::write(self.media_root.join(&handle), bytes)
            .await
            .map_err(|e| CoreError::Infrastructure(format!("Photo write: {}", e)))?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_content_types_are_accepted() {
        assert_eq!(LocalPhotoStore::extension_for("image/png").unwrap(), "png");
        assert!(matches!(
            LocalPhotoStore::extension_for("application/pdf"),
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stored_photos_get_unique_handles() {
        let dir = std::env::temp_dir().join(format!("casa-photos-{}", Uuid::new_v4()));
        let store = LocalPhotoStore::new(dir.clone());
        let a = store.store(b"first", "image/jpeg").await.unwrap();
        let b = store.store(b"second", "image/jpeg").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(tokio::fs::read(dir.join(&a)).await.unwrap(), b"first");
        tokio::fs::remove_dir_all(dir).await.unwrap();
    }
}
