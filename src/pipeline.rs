use crate::media::{MediaKind, MediaMetadata, ResolvedMedia};
use crate::records::DownloadRecord;
use crate::server::AppState;
use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// Bucket/table pair a download is persisted into.
pub struct StoreTarget<'a> {
    pub bucket: &'a str,
    pub table: &'a str,
}

pub struct StoredDownload {
    pub record: DownloadRecord,
    pub bytes: Vec<u8>,
}

/// Shared tail of every download route: materialize the resolved media in
/// memory, upload it under a fresh identifier, mirror the thumbnail, and
/// record a metadata row.
///
/// A metadata-insert failure is logged and swallowed: the payload is already
/// stored by that point and aborting cannot undo the upload.
pub async fn fetch_and_store(
    state: &AppState,
    resolved: &ResolvedMedia,
    metadata: MediaMetadata,
    source_url: &str,
    kind: MediaKind,
    target: StoreTarget<'_>,
) -> Result<StoredDownload> {
    let (leg, media_url) = match kind {
        MediaKind::Mp4 => ("video", resolved.media_url.as_str()),
        MediaKind::Mp3 => (
            "music",
            resolved
                .music_url
                .as_deref()
                .unwrap_or(resolved.media_url.as_str()),
        ),
    };

    let bytes = download_bytes(state, media_url, leg).await?;

    let id = state.ids.download_id();
    let key = format!("{}.{}", id, kind.extension());

    state
        .storage
        .upload(target.bucket, &key, bytes.clone(), kind.content_type())
        .await?;
    info!("Stored {} bytes at {}/{}", bytes.len(), target.bucket, key);

    // Thumbnail mirroring is best effort; never abort the request over it.
    if let Some(thumbnail) = &metadata.thumbnail {
        let thumb_key = format!("{}_thumb.jpg", id);
        match mirror_thumbnail(state, thumbnail, target.bucket, &thumb_key).await {
            Ok(()) => info!("Mirrored thumbnail to {}/{}", target.bucket, thumb_key),
            Err(e) => warn!("Thumbnail mirror failed for {}: {}", id, e),
        }
    }

    let record = DownloadRecord {
        id,
        source_url: source_url.to_string(),
        title: metadata.title,
        author: metadata.author,
        thumbnail_url: metadata.thumbnail,
        media_path_video: (kind == MediaKind::Mp4).then(|| key.clone()),
        media_path_audio: (kind == MediaKind::Mp3).then(|| key.clone()),
        media_type: kind,
    };

    if let Err(e) = state.db.insert(target.table, &record).await {
        // The object is already uploaded; losing the row is the accepted
        // inconsistency rather than failing the whole request.
        error!("Metadata insert into {} failed: {}", target.table, e);
    }

    Ok(StoredDownload { record, bytes })
}

async fn download_bytes(state: &AppState, url: &str, leg: &str) -> Result<Vec<u8>> {
    let response = state
        .http
        .get(url)
        .header(
            reqwest::header::USER_AGENT,
            state.config.providers.user_agent.as_str(),
        )
        .send()
        .await
        .with_context(|| format!("failed to download {} leg", leg))?;

    if !response.status().is_success() {
        anyhow::bail!("failed to download {} leg: HTTP {}", leg, response.status());
    }

    Ok(response
        .bytes()
        .await
        .with_context(|| format!("failed to read {} leg", leg))?
        .to_vec())
}

async fn mirror_thumbnail(state: &AppState, url: &str, bucket: &str, key: &str) -> Result<()> {
    let bytes = download_bytes(state, url, "thumbnail").await?;
    state.storage.upload(bucket, key, bytes, "image/jpeg").await
}
