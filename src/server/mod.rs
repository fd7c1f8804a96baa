pub mod error;
pub mod routes;
pub mod shape;

use crate::config::Config;
use crate::ids::{IdSource, RandomIds};
use crate::imagegen::ImageGenerator;
use crate::media::{CobaltProvider, Provider, ProviderChain, TikwmProvider};
use crate::metrics::{AtomicMetrics, MetricsSink};
use crate::storage::{Datastore, StorageClient};
use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared state injected into every handler. Requests are otherwise
/// independent; the only cross-request state is the best-effort metrics sink.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
    pub storage: Arc<StorageClient>,
    pub db: Arc<Datastore>,
    pub ids: Arc<dyn IdSource>,
    pub metrics: Arc<dyn MetricsSink>,
    pub tiktok_chain: Arc<ProviderChain>,
    pub youtube_chain: Arc<ProviderChain>,
    pub imagegen: Arc<ImageGenerator>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.providers.user_agent.clone())
            .timeout(Duration::from_secs(config.providers.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        // Providers in priority order: the specialized extractor first, then
        // one chain entry per relay mirror.
        let mut tiktok: Vec<Box<dyn Provider>> = vec![Box::new(TikwmProvider::new(
            config.providers.tikwm_base.clone(),
            http.clone(),
        ))];
        let mut youtube: Vec<Box<dyn Provider>> = Vec::new();
        for mirror in &config.providers.cobalt_mirrors {
            tiktok.push(Box::new(CobaltProvider::new(mirror.clone(), http.clone())));
            youtube.push(Box::new(CobaltProvider::new(mirror.clone(), http.clone())));
        }

        let storage = Arc::new(StorageClient::new(
            config.storage.url.clone(),
            config.storage.service_key.clone(),
            http.clone(),
        ));
        let db = Arc::new(Datastore::new(
            config.storage.url.clone(),
            config.storage.service_key.clone(),
            http.clone(),
        ));
        let imagegen = Arc::new(ImageGenerator::new(
            config.providers.image_base.clone(),
            http.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            http,
            storage,
            db,
            ids: Arc::new(RandomIds),
            metrics: Arc::new(AtomicMetrics::new()),
            tiktok_chain: Arc::new(ProviderChain::new(tiktok)),
            youtube_chain: Arc::new(ProviderChain::new(youtube)),
            imagegen,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/tiktok", get(routes::tiktok))
        .route("/api/tiktok/audio", get(routes::tiktok_audio))
        .route("/api/youtube", get(routes::youtube))
        .route("/api/image", get(routes::image))
        .route("/api/result/{id}", get(routes::result_lookup))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let addr = config.bind_addr();
    let state = AppState::new(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down");
}
