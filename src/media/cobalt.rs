use super::{
    provider::Provider,
    types::{MediaKind, ResolvedMedia},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Generic media-extraction relay (cobalt-style API). One instance per
/// configured mirror; each mirror is its own entry in the fallback chain so
/// a dead mirror never aborts the loop.
pub struct CobaltProvider {
    base: String,
    http: reqwest::Client,
}

impl CobaltProvider {
    pub fn new(base: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            http,
        }
    }

    fn request_body(url: &str, kind: MediaKind) -> Value {
        json!({
            "url": url,
            "audioFormat": "mp3",
            "videoQuality": "1080",
            "downloadMode": match kind {
                MediaKind::Mp3 => "audio",
                MediaKind::Mp4 => "auto",
            },
        })
    }

    fn parse_payload(&self, json: &Value) -> Result<ResolvedMedia> {
        let status = json["status"].as_str().unwrap_or("");
        let media_url = match status {
            "tunnel" | "redirect" | "stream" => json["url"].as_str(),
            _ => None,
        };

        let media_url = media_url.with_context(|| {
            format!(
                "cobalt mirror {} gave no usable URL (status {:?})",
                self.base,
                json["status"].as_str().unwrap_or("missing")
            )
        })?;

        // The relay returns only a raw URL; metadata comes from elsewhere.
        Ok(ResolvedMedia {
            media_url: media_url.to_string(),
            music_url: None,
            metadata: None,
        })
    }
}

#[async_trait]
impl Provider for CobaltProvider {
    fn name(&self) -> &'static str {
        "cobalt"
    }

    async fn resolve(&self, url: &str, kind: MediaKind) -> Result<ResolvedMedia> {
        debug!("Querying cobalt mirror {} for: {}", self.base, url);

        let response = self
            .http
            .post(self.base.trim_end_matches('/'))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&Self::request_body(url, kind))
            .send()
            .await
            .with_context(|| format!("cobalt mirror {} unreachable", self.base))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "cobalt mirror {} returned HTTP {}",
                self.base,
                response.status()
            );
        }

        let json: Value = response
            .json()
            .await
            .with_context(|| format!("cobalt mirror {} returned malformed JSON", self.base))?;

        self.parse_payload(&json)
    }
}
