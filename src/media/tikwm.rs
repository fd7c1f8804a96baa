use super::{
    provider::Provider,
    types::{MediaKind, MediaMetadata, ResolvedMedia},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Specialized TikTok extractor. Queried first because a single round trip
/// returns the play URL, the music track URL, and descriptive metadata.
pub struct TikwmProvider {
    base: String,
    http: reqwest::Client,
}

impl TikwmProvider {
    pub fn new(base: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            http,
        }
    }

    /// The API sometimes returns paths relative to its own host.
    fn absolutize(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.base.trim_end_matches('/'), url)
        } else {
            url.to_string()
        }
    }

    fn parse_payload(&self, json: &Value, kind: MediaKind) -> Result<ResolvedMedia> {
        if json["code"].as_i64() != Some(0) {
            anyhow::bail!(
                "tikwm error: {}",
                json["msg"].as_str().unwrap_or("unknown error")
            );
        }

        let data = &json["data"];
        let play = data["play"].as_str();
        let music = data["music"].as_str();

        let media_url = match kind {
            MediaKind::Mp4 => play,
            // Audio requests prefer the dedicated music track.
            MediaKind::Mp3 => music.or(play),
        }
        .context("tikwm response missing media URL")?;

        let metadata = MediaMetadata {
            title: data["title"].as_str().unwrap_or("TikTok Video").to_string(),
            author: data["author"]["nickname"]
                .as_str()
                .or(data["author"]["unique_id"].as_str())
                .unwrap_or("Unknown")
                .to_string(),
            thumbnail: data["cover"].as_str().map(|s| self.absolutize(s)),
        };

        Ok(ResolvedMedia {
            media_url: self.absolutize(media_url),
            music_url: music.map(|m| self.absolutize(m)),
            metadata: Some(metadata),
        })
    }
}

#[async_trait]
impl Provider for TikwmProvider {
    fn name(&self) -> &'static str {
        "tikwm"
    }

    async fn resolve(&self, url: &str, kind: MediaKind) -> Result<ResolvedMedia> {
        debug!("Querying tikwm for: {}", url);

        let endpoint = format!("{}/api/", self.base.trim_end_matches('/'));
        let response = self
            .http
            .get(&endpoint)
            .query(&[("url", url), ("hd", "1")])
            .send()
            .await
            .context("tikwm request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("tikwm returned HTTP {}", response.status());
        }

        let json: Value = response
            .json()
            .await
            .context("tikwm returned malformed JSON")?;

        self.parse_payload(&json, kind)
    }
}
