use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::generate_id;

#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("unsupported content type `{0}`")]
    UnsupportedType(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedVideo {
    pub id: String,
    pub url: String,
    pub duration: Option<f64>,
    pub thumbnail_url: Option<String>,
}

/// Upload folders, nested under the configured root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Posts,
    Stories,
    Chats,
    Profiles,
    Covers,
}

impl MediaFolder {
    pub fn path(&self, root: &str) -> String {
        let leaf = match self {
            MediaFolder::Posts => "posts",
            MediaFolder::Stories => "stories",
            MediaFolder::Chats => "chats",
            MediaFolder::Profiles => "profiles",
            MediaFolder::Covers => "covers",
        };
        format!("{root}/{leaf}")
    }
}

/// A file handed in by the caller, classified by its declared content type.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl MediaUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    pub fn image(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, "image/jpeg")
    }

    pub fn video(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(bytes, "video/mp4")
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }
}

/// External media host.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_image(&self, bytes: &[u8], folder: &str) -> Result<UploadedImage, MediaError>;

    async fn upload_video(&self, bytes: &[u8], folder: &str) -> Result<UploadedVideo, MediaError>;

    /// Idempotent; `false` when nothing was stored under `id`.
    async fn delete(&self, id: &str) -> Result<bool, MediaError>;
}

/// Keeps uploads in memory. Can be switched to fail every upload.
#[derive(Debug, Clone, Default)]
pub struct MemoryMediaStore {
    base_url: String,
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    failing: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub folder: String,
    pub size: usize,
    pub is_video: bool,
}

impl MemoryMediaStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    fn store(&self, bytes: &[u8], folder: &str, is_video: bool) -> Result<(String, String), MediaError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MediaError::Upload("media host unavailable".to_string()));
        }
        let id = format!("{folder}/{}", generate_id());
        let url = format!("{}/{id}", self.base_url.trim_end_matches('/'));
        self.objects.lock().insert(
            id.clone(),
            StoredObject {
                folder: folder.to_string(),
                size: bytes.len(),
                is_video,
            },
        );
        Ok((id, url))
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload_image(&self, bytes: &[u8], folder: &str) -> Result<UploadedImage, MediaError> {
        let (id, url) = self.store(bytes, folder, false)?;
        Ok(UploadedImage { id, url })
    }

    async fn upload_video(&self, bytes: &[u8], folder: &str) -> Result<UploadedVideo, MediaError> {
        let (id, url) = self.store(bytes, folder, true)?;
        Ok(UploadedVideo {
            thumbnail_url: Some(format!("{url}.jpg")),
            duration: None,
            id,
            url,
        })
    }

    async fn delete(&self, id: &str) -> Result<bool, MediaError> {
        Ok(self.objects.lock().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_and_deletes() {
        let media = MemoryMediaStore::new("https://cdn.test/");
        let image = media.upload_image(b"jpeg", "travel-diary/posts").await.unwrap();
        assert!(image.url.starts_with("https://cdn.test/travel-diary/posts/"));
        assert!(media.contains(&image.id));

        assert!(media.delete(&image.id).await.unwrap());
        assert!(!media.delete(&image.id).await.unwrap());
        assert!(media.is_empty());
    }

    #[tokio::test]
    async fn failing_store_rejects_uploads() {
        let media = MemoryMediaStore::new("https://cdn.test");
        media.set_failing(true);
        assert!(media.upload_video(b"mp4", "travel-diary/posts").await.is_err());
        assert_eq!(media.len(), 0);
    }

    #[test]
    fn classifies_content_types() {
        assert!(MediaUpload::new(vec![1], "image/png").is_image());
        assert!(MediaUpload::new(vec![1], "video/quicktime").is_video());
        let other = MediaUpload::new(vec![1], "application/pdf");
        assert!(!other.is_image() && !other.is_video());
        assert_eq!(MediaFolder::Covers.path("travel-diary"), "travel-diary/covers");
    }
}
