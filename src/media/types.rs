use serde::{Deserialize, Serialize};

/// The media kind a caller asks for via the `type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Mp3,
    Mp4,
}

impl MediaKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "mp3" => Some(Self::Mp3),
            "mp4" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Mp4 => "video/mp4",
        }
    }
}

/// Descriptive metadata for a resolved source. Providers that only hand back
/// a raw media URL leave this out; the route then falls back to a placeholder
/// or to the independently fetched embed metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaMetadata {
    pub title: String,
    pub author: String,
    pub thumbnail: Option<String>,
}

/// Outcome of a successful provider resolution: a direct media URL, an
/// optional separate audio-track URL, and whatever metadata the provider
/// returned in the same round trip.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub media_url: String,
    pub music_url: Option<String>,
    pub metadata: Option<MediaMetadata>,
}
