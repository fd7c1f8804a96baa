use super::types::{MediaKind, ResolvedMedia};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable name of the provider
    fn name(&self) -> &'static str;

    /// Resolve a source URL to a direct media URL for the requested kind.
    ///
    /// Any failure here is a soft failure: the chain logs it and moves on to
    /// the next provider.
    async fn resolve(&self, url: &str, kind: MediaKind) -> Result<ResolvedMedia>;
}
