use serde::{Deserialize, Serialize};

use crate::collaborators::{UploadedImage, UploadedVideo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A file held by the media store, as referenced from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub public_id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl From<UploadedImage> for MediaItem {
    fn from(upload: UploadedImage) -> Self {
        Self {
            public_id: upload.id,
            url: upload.url,
            kind: MediaKind::Image,
            thumbnail: None,
            duration: None,
        }
    }
}

impl From<UploadedVideo> for MediaItem {
    fn from(upload: UploadedVideo) -> Self {
        Self {
            public_id: upload.id,
            url: upload.url,
            kind: MediaKind::Video,
            thumbnail: upload.thumbnail_url,
            duration: upload.duration,
        }
    }
}

/// Profile picture or cover photo. Generated avatars carry no `public_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    pub url: String,
}

impl From<UploadedImage> for ImageRef {
    fn from(upload: UploadedImage) -> Self {
        Self {
            public_id: Some(upload.id),
            url: upload.url,
        }
    }
}
