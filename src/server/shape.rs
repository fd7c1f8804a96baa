use crate::media::MediaKind;
use crate::pipeline::StoredDownload;
use anyhow::{Context, Result};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// JSON body of a successful download, pointing back at the lookup endpoint
/// rather than a persisted public URL.
#[derive(Debug, Serialize)]
pub struct DownloadDescriptor {
    pub id: String,
    pub source_url: String,
    pub title: String,
    pub author: String,
    pub thumbnail: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaKind,
    pub result_url: String,
}

pub fn result_url(public_base: &str, id: &str, table: &str) -> String {
    format!(
        "{}/api/result/{}?table={}",
        public_base.trim_end_matches('/'),
        id,
        table
    )
}

pub fn ok_envelope(result: impl Serialize) -> Json<serde_json::Value> {
    Json(json!({"status": true, "result": result}))
}

/// Decide between streaming the bytes inline and returning a descriptor.
///
/// Immediate delivery (`auto_show`, default true) only applies to video,
/// which is the kind naturally streamed inline; audio always gets the JSON
/// envelope.
pub fn respond_download(
    stored: StoredDownload,
    kind: MediaKind,
    auto_show: bool,
    public_base: &str,
    table: &str,
) -> Result<Response> {
    if auto_show && kind == MediaKind::Mp4 {
        let filename = format!("{}.{}", stored.record.id, kind.extension());
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(kind.content_type()),
        );
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&format!("inline; filename=\"{}\"", filename))
                .context("invalid content-disposition")?,
        );
        return Ok((headers, stored.bytes).into_response());
    }

    let descriptor = DownloadDescriptor {
        result_url: result_url(public_base, &stored.record.id, table),
        id: stored.record.id,
        source_url: stored.record.source_url,
        title: stored.record.title,
        author: stored.record.author,
        thumbnail: stored.record.thumbnail_url,
        media_type: kind,
    };

    Ok(ok_envelope(descriptor).into_response())
}
