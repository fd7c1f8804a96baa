mod cobalt;
mod provider;
mod tikwm;
mod types;
pub mod youtube;

pub use cobalt::CobaltProvider;
pub use provider::Provider;
pub use tikwm::TikwmProvider;
pub use types::{MediaKind, MediaMetadata, ResolvedMedia};

use anyhow::Result;
use tracing::{info, warn};

/// Ordered fallback chain over media providers.
///
/// Each provider is tried exactly once, in priority order. A provider failure
/// is logged and swallowed; the first success wins and later providers are
/// never consulted. There is no retry, backoff, or result comparison.
pub struct ProviderChain {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self { providers }
    }

    pub async fn resolve(&self, url: &str, kind: MediaKind) -> Result<ResolvedMedia> {
        info!("Resolving media URL for: {}", url);

        let mut errors = Vec::new();

        for provider in &self.providers {
            match provider.resolve(url, kind).await {
                Ok(resolved) => {
                    info!("Resolved media URL with {}", provider.name());
                    return Ok(resolved);
                }
                Err(e) => {
                    warn!("{} failed: {}", provider.name(), e);
                    errors.push(format!("{e}"));
                }
            }
        }

        Err(anyhow::anyhow!(
            "no media URL found from any provider: {}",
            errors.join(". ")
        ))
    }
}
