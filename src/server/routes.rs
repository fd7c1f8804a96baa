use super::error::ApiError;
use super::shape;
use super::AppState;
use crate::media::{youtube, MediaKind, MediaMetadata};
use crate::metrics::{Counter, MetricsSink};
use crate::pipeline::{self, StoreTarget};
use crate::records::{GeneratedImageRecord, StoredRecord};
use axum::extract::{Path as RoutePath, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    auto_show: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    url: Option<String>,
    auto_show: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ImageQuery {
    prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    table: Option<String>,
}

fn require(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("missing required parameter: {name}")))
}

fn parse_kind(raw: Option<String>) -> Result<MediaKind, ApiError> {
    let raw = require(raw, "type")?;
    MediaKind::parse(&raw).ok_or_else(|| {
        ApiError::bad_request(format!("invalid type: {raw} (expected mp3 or mp4)"))
    })
}

/// Count hit/success/error around a handler body.
async fn tally<F>(metrics: &Arc<dyn MetricsSink>, body: F) -> Result<Response, ApiError>
where
    F: Future<Output = Result<Response, ApiError>>,
{
    metrics.incr(Counter::Hits);
    match body.await {
        Ok(response) => {
            metrics.incr(Counter::Successes);
            Ok(response)
        }
        Err(e) => {
            metrics.incr(Counter::Errors);
            Err(e)
        }
    }
}

fn tiktok_placeholder() -> MediaMetadata {
    MediaMetadata {
        title: "TikTok Video".to_string(),
        author: "Unknown".to_string(),
        thumbnail: None,
    }
}

/// Platform-A extractor: TikTok video or audio.
pub async fn tiktok(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let metrics = state.metrics.clone();
    tally(&metrics, async move {
        let url = require(query.url, "url")?;
        let kind = parse_kind(query.kind)?;
        let auto_show = query.auto_show.unwrap_or(true);

        let resolved = state
            .tiktok_chain
            .resolve(&url, kind)
            .await
            .map_err(ApiError::upstream)?;
        let metadata = resolved.metadata.clone().unwrap_or_else(tiktok_placeholder);

        let target = &state.config.targets.tiktok;
        let stored = pipeline::fetch_and_store(
            &state,
            &resolved,
            metadata,
            &url,
            kind,
            StoreTarget {
                bucket: &target.bucket,
                table: &target.table,
            },
        )
        .await
        .map_err(ApiError::upstream)?;

        shape::respond_download(
            stored,
            kind,
            auto_show,
            &state.config.server.public_base_url,
            &target.table,
        )
        .map_err(ApiError::from)
    })
    .await
}

/// Audio-only platform-A extractor.
pub async fn tiktok_audio(
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
) -> Result<Response, ApiError> {
    let metrics = state.metrics.clone();
    tally(&metrics, async move {
        let url = require(query.url, "url")?;
        let kind = MediaKind::Mp3;
        let auto_show = query.auto_show.unwrap_or(true);

        let resolved = state
            .tiktok_chain
            .resolve(&url, kind)
            .await
            .map_err(ApiError::upstream)?;
        let metadata = resolved.metadata.clone().unwrap_or_else(tiktok_placeholder);

        let target = &state.config.targets.tiktok_audio;
        let stored = pipeline::fetch_and_store(
            &state,
            &resolved,
            metadata,
            &url,
            kind,
            StoreTarget {
                bucket: &target.bucket,
                table: &target.table,
            },
        )
        .await
        .map_err(ApiError::upstream)?;

        shape::respond_download(
            stored,
            kind,
            auto_show,
            &state.config.server.public_base_url,
            &target.table,
        )
        .map_err(ApiError::from)
    })
    .await
}

/// Platform-B extractor backed by the generic relay. Metadata enrichment and
/// media-URL resolution are independent, so they run concurrently.
pub async fn youtube(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let metrics = state.metrics.clone();
    tally(&metrics, async move {
        let url = require(query.url, "url")?;
        let kind = parse_kind(query.kind)?;
        let auto_show = query.auto_show.unwrap_or(true);

        let video_id =
            youtube::extract_video_id(&url).map_err(|e| ApiError::bad_request(format!("{e}")))?;

        let (resolved, metadata) = tokio::join!(
            state.youtube_chain.resolve(&url, kind),
            youtube::fetch_metadata(
                &state.http,
                &state.config.providers.oembed_base,
                &url,
                &video_id,
            ),
        );
        let resolved = resolved.map_err(ApiError::upstream)?;
        // The relay gives no metadata of its own; the enrichment result (or
        // its placeholders) always wins here.
        let metadata = resolved.metadata.clone().unwrap_or(metadata);

        let target = &state.config.targets.youtube;
        let stored = pipeline::fetch_and_store(
            &state,
            &resolved,
            metadata,
            &url,
            kind,
            StoreTarget {
                bucket: &target.bucket,
                table: &target.table,
            },
        )
        .await
        .map_err(ApiError::upstream)?;

        shape::respond_download(
            stored,
            kind,
            auto_show,
            &state.config.server.public_base_url,
            &target.table,
        )
        .map_err(ApiError::from)
    })
    .await
}

/// AI image generation: watermarked PNG bytes plus an `X-Result-URL` header.
pub async fn image(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Response, ApiError> {
    let metrics = state.metrics.clone();
    tally(&metrics, async move {
        let prompt = require(query.prompt, "prompt")?;

        let payload = state
            .imagegen
            .generate(&prompt)
            .await
            .map_err(ApiError::upstream)?;

        // Watermarking is post-processing of a secondary concern: a broken
        // or missing watermark degrades to the raw image.
        let payload = match &state.config.watermark.path {
            Some(path) => match crate::imagegen::apply_watermark(&payload, Path::new(path)) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Watermarking failed, serving unwatermarked image: {}", e);
                    payload
                }
            },
            None => payload,
        };

        let id = state.ids.image_id();
        let key = format!("{}.png", id);
        let target = &state.config.targets.images;

        state
            .storage
            .upload(&target.bucket, &key, payload.clone(), "image/png")
            .await
            .map_err(ApiError::upstream)?;

        let record = GeneratedImageRecord {
            id: id.clone(),
            prompt,
            image_path: key,
        };
        if let Err(e) = state.db.insert(&target.table, &record).await {
            error!("Metadata insert into {} failed: {}", target.table, e);
        }

        let result_url =
            shape::result_url(&state.config.server.public_base_url, &id, &target.table);

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert(
            HeaderName::from_static("x-result-url"),
            HeaderValue::from_str(&result_url)
                .map_err(|e| ApiError::from(anyhow::Error::from(e)))?,
        );

        Ok((headers, payload).into_response())
    })
    .await
}

/// Result lookup: re-derive a public URL from the stored path at read time.
pub async fn result_lookup(
    State(state): State<AppState>,
    RoutePath(id): RoutePath<String>,
    Query(query): Query<LookupQuery>,
) -> Result<Response, ApiError> {
    let metrics = state.metrics.clone();
    tally(&metrics, async move {
        let table = query
            .table
            .unwrap_or_else(|| state.config.targets.tiktok.table.clone());
        let target = state
            .config
            .target_for_table(&table)
            .ok_or_else(|| ApiError::bad_request(format!("unknown table: {table}")))?;

        let record: StoredRecord = state
            .db
            .fetch_by_id(&table, &id)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::not_found("Download not found"))?;

        let path = record
            .stored_path()
            .ok_or_else(|| ApiError::not_found("File not found"))?;
        let url = state.storage.public_url(&target.bucket, path);

        Ok(shape::ok_envelope(json!({
            "id": record.id,
            "source_url": record.source_url,
            "title": record.title,
            "author": record.author,
            "thumbnail": record.thumbnail_url,
            "type": record.media_type,
            "prompt": record.prompt,
            "url": url,
        }))
        .into_response())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ids::FixedIds;
    use crate::imagegen::ImageGenerator;
    use crate::media::{Provider, ProviderChain, ResolvedMedia};
    use crate::metrics::AtomicMetrics;
    use crate::server::router;
    use crate::storage::{Datastore, StorageClient};
    use anyhow::Result;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::extract::Path as AxumPath;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const MEDIA_BYTES: &[u8] = b"fake media payload";
    const IMAGE_BYTES: &[u8] = b"fake png payload";

    /// In-memory stand-in for the hosted storage/datastore/provider trio.
    /// Uploads are recorded as (bucket/key, content type) pairs; flipping
    /// `fail_inserts` makes every metadata insert come back as a 500.
    #[derive(Clone, Default)]
    struct MockUpstream {
        uploads: Arc<Mutex<Vec<(String, String)>>>,
        inserts: Arc<Mutex<Vec<(String, Value)>>>,
        lookup_row: Arc<Mutex<Option<Value>>>,
        fail_inserts: Arc<AtomicBool>,
    }

    impl MockUpstream {
        fn uploaded_paths(&self) -> Vec<String> {
            self.uploads
                .lock()
                .unwrap()
                .iter()
                .map(|(path, _)| path.clone())
                .collect()
        }
    }

    async fn spawn_upstream(mock: MockUpstream) -> SocketAddr {
        let app = Router::new()
            .route(
                "/media/{file}",
                get(|| async { MEDIA_BYTES.to_vec() }),
            )
            .route(
                "/prompt/{prompt}",
                get(|| async { IMAGE_BYTES.to_vec() }),
            )
            .route(
                "/storage/v1/object/{bucket}/{key}",
                post(
                    |AxumPath((bucket, key)): AxumPath<(String, String)>,
                     axum::extract::State(mock): axum::extract::State<MockUpstream>,
                     request_headers: HeaderMap| async move {
                        let content_type = request_headers
                            .get(header::CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        mock.uploads
                            .lock()
                            .unwrap()
                            .push((format!("{bucket}/{key}"), content_type));
                        StatusCode::OK
                    },
                ),
            )
            .route(
                "/rest/v1/{table}",
                post(
                    |AxumPath(table): AxumPath<String>,
                     axum::extract::State(mock): axum::extract::State<MockUpstream>,
                     Json(row): Json<Value>| async move {
                        if mock.fail_inserts.load(Ordering::SeqCst) {
                            return StatusCode::INTERNAL_SERVER_ERROR;
                        }
                        mock.inserts.lock().unwrap().push((table, row));
                        StatusCode::CREATED
                    },
                )
                .get(
                    |axum::extract::State(mock): axum::extract::State<MockUpstream>| async move {
                        let rows: Vec<Value> =
                            mock.lookup_row.lock().unwrap().clone().into_iter().collect();
                        Json(rows)
                    },
                ),
            )
            .with_state(mock);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    struct StubProvider {
        media_url: Option<String>,
        music_url: Option<String>,
        metadata: Option<MediaMetadata>,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn resolve(&self, _url: &str, _kind: MediaKind) -> Result<ResolvedMedia> {
            match &self.media_url {
                Some(url) => Ok(ResolvedMedia {
                    media_url: url.clone(),
                    music_url: self.music_url.clone(),
                    metadata: self.metadata.clone(),
                }),
                None => Err(anyhow::anyhow!("stub is down")),
            }
        }
    }

    struct TestContext {
        state: AppState,
        metrics: Arc<AtomicMetrics>,
        mock: MockUpstream,
    }

    /// Spawn the mock upstream and wire an AppState at it. `media_path` is
    /// the path (on the mock server) the stub provider resolves to; None
    /// makes every provider fail.
    async fn context_with_chain(media_path: Option<&str>) -> TestContext {
        context_with_thumbnail(media_path, None).await
    }

    /// Like `context_with_chain`, but the stub provider also reports resolver
    /// metadata whose thumbnail points at `thumb_path` on the mock server.
    async fn context_with_thumbnail(
        media_path: Option<&str>,
        thumb_path: Option<&str>,
    ) -> TestContext {
        let mock = MockUpstream::default();
        let addr = spawn_upstream(mock.clone()).await;
        let base = format!("http://{addr}");
        let media_url = media_path.map(|p| format!("{base}{p}"));
        let metadata = thumb_path.map(|p| MediaMetadata {
            title: "Stub Title".to_string(),
            author: "Stub Author".to_string(),
            thumbnail: Some(format!("{base}{p}")),
        });

        let mut config = Config::default();
        config.storage.url = base.clone();
        config.providers.image_base = format!("{base}/prompt");
        // An unroutable oEmbed endpoint exercises the placeholder path.
        config.providers.oembed_base = format!("{base}/nonexistent");

        let http = reqwest::Client::new();
        let metrics = Arc::new(AtomicMetrics::new());
        let chain = ProviderChain::new(vec![Box::new(StubProvider {
            media_url: media_url.clone(),
            music_url: None,
            metadata: metadata.clone(),
        })]);
        let youtube_chain = ProviderChain::new(vec![Box::new(StubProvider {
            media_url,
            music_url: None,
            metadata,
        })]);

        let state = AppState {
            storage: Arc::new(StorageClient::new(base.clone(), "key", http.clone())),
            db: Arc::new(Datastore::new(base.clone(), "key", http.clone())),
            imagegen: Arc::new(ImageGenerator::new(
                config.providers.image_base.clone(),
                http.clone(),
            )),
            config: Arc::new(config),
            http,
            ids: Arc::new(FixedIds {
                download: "fixed-id".to_string(),
                image: "1a2b3c4d".to_string(),
            }),
            metrics: metrics.clone(),
            tiktok_chain: Arc::new(chain),
            youtube_chain: Arc::new(youtube_chain),
        };

        TestContext {
            state,
            metrics,
            mock,
        }
    }

    async fn get_response(state: AppState, uri: &str) -> (StatusCode, Vec<u8>, HeaderMap) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec(), headers)
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_is_400() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) = get_response(ctx.state, "/api/tiktok?type=mp4").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = json_body(&body);
        assert_eq!(body["status"], false);
        assert_eq!(body["error"], "missing required parameter: url");
    }

    #[tokio::test]
    async fn test_missing_type_is_400() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) =
            get_response(ctx.state, "/api/tiktok?url=https://tiktok.com/v/1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(&body)["error"],
            "missing required parameter: type"
        );
    }

    #[tokio::test]
    async fn test_invalid_type_is_400() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) =
            get_response(ctx.state, "/api/tiktok?url=https://tiktok.com/v/1&type=flac").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_body(&body)["error"]
            .as_str()
            .unwrap()
            .contains("invalid type"));
    }

    #[tokio::test]
    async fn test_missing_prompt_is_400() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) = get_response(ctx.state, "/api/image").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(&body)["error"],
            "missing required parameter: prompt"
        );
    }

    #[tokio::test]
    async fn test_invalid_youtube_url_is_400() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) =
            get_response(ctx.state, "/api/youtube?url=https://example.com/x&type=mp4").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_body(&body)["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid URL"));
    }

    #[tokio::test]
    async fn test_provider_exhaustion_is_500_with_no_storage_write() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) =
            get_response(ctx.state, "/api/tiktok?url=https://tiktok.com/v/1&type=mp4").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(&body)["error"]
            .as_str()
            .unwrap()
            .starts_with("no media URL found from any provider"));
        assert!(ctx.mock.uploads.lock().unwrap().is_empty());
        assert!(ctx.mock.inserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tiktok_mp4_default_is_inline_bytes() {
        let ctx = context_with_chain(Some("/media/a.mp4")).await;

        let (status, body, headers) =
            get_response(ctx.state, "/api/tiktok?url=https://tiktok.com/v/1&type=mp4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "inline; filename=\"fixed-id.mp4\""
        );
        assert_eq!(body, MEDIA_BYTES);

        let uploads = ctx.mock.uploaded_paths();
        assert!(uploads.contains(&"tiktok-media/fixed-id.mp4".to_string()));

        let inserts = ctx.mock.inserts.lock().unwrap().clone();
        assert_eq!(inserts.len(), 1);
        let (table, row) = &inserts[0];
        assert_eq!(table, "tiktok_downloads");
        assert_eq!(row["media_path_video"], "fixed-id.mp4");
        assert!(row["media_path_audio"].is_null());
        // Stub provider carries no metadata, so placeholders apply.
        assert_eq!(row["title"], "TikTok Video");
        assert_eq!(row["author"], "Unknown");
    }

    #[tokio::test]
    async fn test_audio_route_stores_mp3_and_returns_envelope() {
        let ctx = context_with_chain(Some("/media/a.mp3")).await;

        let (status, body, _) = get_response(
            ctx.state.clone(),
            "/api/tiktok/audio?url=https://tiktok.com/v/1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        assert_eq!(body["status"], true);
        assert_eq!(body["result"]["type"], "mp3");
        assert_eq!(
            body["result"]["result_url"],
            "http://localhost:8080/api/result/fixed-id?table=tiktok_audio_downloads"
        );

        let uploads = ctx.mock.uploaded_paths();
        assert!(uploads.contains(&"tiktok-audio/fixed-id.mp3".to_string()));

        let inserts = ctx.mock.inserts.lock().unwrap().clone();
        let (_, row) = &inserts[0];
        assert_eq!(row["media_path_audio"], "fixed-id.mp3");
        assert!(row["media_path_video"].is_null());
    }

    #[tokio::test]
    async fn test_youtube_envelope_uses_placeholder_metadata() {
        let ctx = context_with_chain(Some("/media/a.mp4")).await;

        let (status, body, _) = get_response(
            ctx.state,
            "/api/youtube?url=https://youtu.be/dQw4w9WgXcQ&type=mp4&auto_show=false",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&body);
        // oEmbed endpoint 404s in this context, so placeholders win.
        assert_eq!(body["result"]["title"], "YouTube Video");
        assert_eq!(body["result"]["author"], "Unknown");
        assert_eq!(
            body["result"]["thumbnail"],
            "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
    }

    #[tokio::test]
    async fn test_image_route_returns_png_with_result_url_header() {
        let ctx = context_with_chain(None).await;
        let (status, body, headers) = get_response(ctx.state, "/api/image?prompt=a+red+fox").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(
            headers.get("x-result-url").unwrap(),
            "http://localhost:8080/api/result/1a2b3c4d?table=generated_images"
        );
        assert_eq!(body, IMAGE_BYTES);

        let uploads = ctx.mock.uploaded_paths();
        assert!(uploads.contains(&"generated-images/1a2b3c4d.png".to_string()));

        let inserts = ctx.mock.inserts.lock().unwrap().clone();
        let (table, row) = &inserts[0];
        assert_eq!(table, "generated_images");
        assert_eq!(row["prompt"], "a red fox");
        assert_eq!(row["image_path"], "1a2b3c4d.png");
    }

    #[tokio::test]
    async fn test_lookup_returns_descriptor_and_is_idempotent() {
        let ctx = context_with_chain(None).await;
        *ctx.mock.lookup_row.lock().unwrap() = Some(serde_json::json!({
            "id": "fixed-id",
            "source_url": "https://tiktok.com/v/1",
            "title": "t",
            "author": "a",
            "thumbnail_url": null,
            "media_path_video": "fixed-id.mp4",
            "media_path_audio": null,
            "media_type": "mp4"
        }));

        let uri = "/api/result/fixed-id?table=tiktok_downloads";
        let (status, first, _) = get_response(ctx.state.clone(), uri).await;
        assert_eq!(status, StatusCode::OK);
        let body = json_body(&first);
        assert_eq!(body["status"], true);
        assert!(body["result"]["url"]
            .as_str()
            .unwrap()
            .ends_with("/storage/v1/object/public/tiktok-media/fixed-id.mp4"));

        let (_, second, _) = get_response(ctx.state, uri).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_lookup_missing_row_is_404() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) = get_response(ctx.state, "/api/result/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&body)["error"], "Download not found");
    }

    #[tokio::test]
    async fn test_lookup_missing_path_is_404() {
        let ctx = context_with_chain(None).await;
        *ctx.mock.lookup_row.lock().unwrap() = Some(serde_json::json!({"id": "fixed-id"}));
        let (status, body, _) = get_response(ctx.state, "/api/result/fixed-id").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&body)["error"], "File not found");
    }

    #[tokio::test]
    async fn test_lookup_unknown_table_is_400() {
        let ctx = context_with_chain(None).await;
        let (status, body, _) = get_response(ctx.state, "/api/result/x?table=users").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json_body(&body)["error"]
            .as_str()
            .unwrap()
            .contains("unknown table"));
    }

    #[tokio::test]
    async fn test_metrics_tally_errors() {
        let ctx = context_with_chain(None).await;
        let metrics = ctx.metrics.clone();
        let (_, _, _) = get_response(ctx.state, "/api/tiktok?type=mp4").await;
        assert_eq!(metrics.get(Counter::Hits), 1);
        assert_eq!(metrics.get(Counter::Errors), 1);
        assert_eq!(metrics.get(Counter::Successes), 0);
    }

    #[tokio::test]
    async fn test_lookup_errors_are_tallied() {
        let ctx = context_with_chain(None).await;
        let metrics = ctx.metrics.clone();
        let (status, _, _) = get_response(ctx.state, "/api/result/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(metrics.get(Counter::Hits), 1);
        assert_eq!(metrics.get(Counter::Errors), 1);
        assert_eq!(metrics.get(Counter::Successes), 0);
    }

    #[tokio::test]
    async fn test_thumbnail_is_mirrored_next_to_media() {
        let ctx = context_with_thumbnail(Some("/media/a.mp4"), Some("/media/thumb.jpg")).await;

        let (status, _, _) =
            get_response(ctx.state, "/api/tiktok?url=https://tiktok.com/v/1&type=mp4").await;
        assert_eq!(status, StatusCode::OK);

        let uploads = ctx.mock.uploads.lock().unwrap().clone();
        assert!(uploads.contains(&(
            "tiktok-media/fixed-id.mp4".to_string(),
            "video/mp4".to_string()
        )));
        assert!(uploads.contains(&(
            "tiktok-media/fixed-id_thumb.jpg".to_string(),
            "image/jpeg".to_string()
        )));

        let inserts = ctx.mock.inserts.lock().unwrap().clone();
        let (_, row) = &inserts[0];
        assert!(row["thumbnail_url"]
            .as_str()
            .unwrap()
            .ends_with("/media/thumb.jpg"));
    }

    #[tokio::test]
    async fn test_failed_thumbnail_mirror_does_not_fail_the_download() {
        let ctx = context_with_thumbnail(Some("/media/a.mp4"), Some("/nonexistent/thumb.jpg")).await;

        let (status, body, _) =
            get_response(ctx.state, "/api/tiktok?url=https://tiktok.com/v/1&type=mp4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, MEDIA_BYTES);

        let uploads = ctx.mock.uploaded_paths();
        assert!(uploads.contains(&"tiktok-media/fixed-id.mp4".to_string()));
        assert!(!uploads.iter().any(|path| path.ends_with("_thumb.jpg")));
    }

    #[tokio::test]
    async fn test_download_survives_failed_metadata_insert() {
        let ctx = context_with_chain(Some("/media/a.mp4")).await;
        ctx.mock.fail_inserts.store(true, Ordering::SeqCst);

        let (status, body, headers) =
            get_response(ctx.state, "/api/tiktok?url=https://tiktok.com/v/1&type=mp4").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
        assert_eq!(body, MEDIA_BYTES);

        // The payload is stored and delivered even though no row landed.
        assert!(ctx
            .mock
            .uploaded_paths()
            .contains(&"tiktok-media/fixed-id.mp4".to_string()));
        assert!(ctx.mock.inserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_image_survives_failed_metadata_insert() {
        let ctx = context_with_chain(None).await;
        ctx.mock.fail_inserts.store(true, Ordering::SeqCst);

        let (status, body, headers) = get_response(ctx.state, "/api/image?prompt=a+red+fox").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, IMAGE_BYTES);
        assert!(headers.get("x-result-url").is_some());
        assert!(ctx.mock.inserts.lock().unwrap().is_empty());
    }
}
