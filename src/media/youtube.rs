use super::types::MediaMetadata;
use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Extract the 11-character video identifier from any of the URL shapes
/// YouTube hands out. Patterns are tried in order; the first match wins.
///
/// Accepted shapes: canonical `watch?v=` URLs, `youtu.be` short links,
/// `/embed/` URLs, `/shorts/` URLs, and a bare identifier.
pub fn extract_video_id(input: &str) -> Result<String> {
    if let Ok(parsed) = Url::parse(input) {
        let host = parsed.host_str().unwrap_or("");

        if host == "youtube.com" || host.ends_with(".youtube.com") {
            // Canonical watch URL: youtube.com/watch?v=<id>
            if parsed.path() == "/watch" {
                if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k.as_ref() == "v") {
                    if is_video_id(&v) {
                        return Ok(v.into_owned());
                    }
                }
            }

            // Embed and shorts URLs carry the id as a path segment.
            for prefix in ["/embed/", "/shorts/"] {
                if let Some(rest) = parsed.path().strip_prefix(prefix) {
                    let candidate = rest.split('/').next().unwrap_or("");
                    if is_video_id(candidate) {
                        return Ok(candidate.to_string());
                    }
                }
            }
        }

        // Short link: youtu.be/<id>
        if host == "youtu.be" {
            let candidate = parsed.path().trim_start_matches('/');
            let candidate = candidate.split('/').next().unwrap_or("");
            if is_video_id(candidate) {
                return Ok(candidate.to_string());
            }
        }
    }

    // A bare identifier is also accepted.
    if is_video_id(input) {
        return Ok(input.to_string());
    }

    Err(anyhow::anyhow!("invalid URL: {}", input))
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Deterministic thumbnail URL derived from the video identifier. Used as a
/// placeholder whenever the embed lookup fails or omits a thumbnail.
pub fn derived_thumbnail(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id)
}

fn placeholder(video_id: &str) -> MediaMetadata {
    MediaMetadata {
        title: "YouTube Video".to_string(),
        author: "Unknown".to_string(),
        thumbnail: Some(derived_thumbnail(video_id)),
    }
}

/// Fetch title/author/thumbnail from the public oEmbed endpoint.
///
/// Runs independently of media-URL resolution so the two can be joined
/// concurrently. Never fails: any error degrades to the placeholder triple.
pub async fn fetch_metadata(
    http: &reqwest::Client,
    oembed_base: &str,
    source_url: &str,
    video_id: &str,
) -> MediaMetadata {
    debug!("Fetching oEmbed metadata for: {}", source_url);

    let result = async {
        let response = http
            .get(oembed_base)
            .query(&[("url", source_url), ("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("oEmbed returned HTTP {}", response.status());
        }

        let json: Value = response.json().await?;
        Ok::<_, anyhow::Error>(MediaMetadata {
            title: json["title"].as_str().unwrap_or("YouTube Video").to_string(),
            author: json["author_name"].as_str().unwrap_or("Unknown").to_string(),
            thumbnail: Some(
                json["thumbnail_url"]
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| derived_thumbnail(video_id)),
            ),
        })
    }
    .await;

    match result {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("oEmbed lookup failed, using placeholders: {}", e);
            placeholder(video_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_watch_url() {
        let id = extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_short_link() {
        let id = extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_short_link_with_query() {
        let id = extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=tracking").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_embed_url() {
        let id = extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_shorts_url() {
        let id = extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_bare_id() {
        let id = extract_video_id("dQw4w9WgXcQ").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_watch_url_with_extra_params() {
        let id =
            extract_video_id("https://www.youtube.com/watch?t=42&v=dQw4w9WgXcQ&list=PL").unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_rejects_garbage() {
        assert!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(extract_video_id("https://notyoutube.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(extract_video_id("not a url at all").is_err());
        assert!(extract_video_id("").is_err());
        assert!(extract_video_id("https://youtu.be/short").is_err());
    }

    #[test]
    fn test_extract_error_message() {
        let err = extract_video_id("nope").unwrap_err();
        assert!(format!("{err}").starts_with("invalid URL"));
    }

    #[test]
    fn test_derived_thumbnail() {
        assert_eq!(
            derived_thumbnail("dQw4w9WgXcQ"),
            "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
    }

    #[test]
    fn test_placeholder_triple() {
        let meta = placeholder("dQw4w9WgXcQ");
        assert_eq!(meta.title, "YouTube Video");
        assert_eq!(meta.author, "Unknown");
        assert_eq!(
            meta.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
    }
}
