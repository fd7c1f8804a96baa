use crate::media::MediaKind;
use serde::{Deserialize, Serialize};

/// Metadata row written once per successful download. Never mutated or
/// deleted by this service. Exactly one of the two path fields is populated,
/// matching the requested media kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,
    pub source_url: String,
    pub title: String,
    pub author: String,
    pub thumbnail_url: Option<String>,
    pub media_path_video: Option<String>,
    pub media_path_audio: Option<String>,
    pub media_type: MediaKind,
}

impl DownloadRecord {
    #[allow(dead_code)]
    pub fn media_path(&self) -> Option<&str> {
        self.media_path_video
            .as_deref()
            .or(self.media_path_audio.as_deref())
    }
}

/// Metadata row for an AI-generated image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImageRecord {
    pub id: String,
    pub prompt: String,
    pub image_path: String,
}

/// Union row shape used by the result-lookup endpoint, which reads from any
/// of the per-route tables. Fields absent from a given table deserialize to
/// None.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub media_path_video: Option<String>,
    #[serde(default)]
    pub media_path_audio: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaKind>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl StoredRecord {
    /// Whichever path field is populated, in a fixed probe order.
    pub fn stored_path(&self) -> Option<&str> {
        self.media_path_video
            .as_deref()
            .or(self.media_path_audio.as_deref())
            .or(self.image_path.as_deref())
    }
}
