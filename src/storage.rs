use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// Client for the hosted object store, spoken to over its REST contract.
/// Uploads allow overwrite; public URLs are derived at read time and never
/// persisted, so the provider can change its URL scheme.
pub struct StorageClient {
    base: String,
    service_key: String,
    http: reqwest::Client,
}

impl StorageClient {
    pub fn new(base: impl Into<String>, service_key: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            service_key: service_key.into(),
            http,
        }
    }

    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, key);

        let endpoint = format!(
            "{}/storage/v1/object/{}/{}",
            self.base.trim_end_matches('/'),
            bucket,
            key
        );

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.service_key)
            .header("apikey", self.service_key.as_str())
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("upload to bucket {} failed", bucket))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "upload to bucket {} failed: HTTP {}",
                bucket,
                response.status()
            );
        }

        Ok(())
    }

    /// Read-time derivation of a fetchable URL from a stored object path.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base.trim_end_matches('/'),
            bucket,
            key
        )
    }
}

/// Client for the hosted relational datastore (PostgREST-style contract).
/// Insert-and-fetch only; no transactions beyond what the provider offers.
pub struct Datastore {
    base: String,
    service_key: String,
    http: reqwest::Client,
}

impl Datastore {
    pub fn new(base: impl Into<String>, service_key: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            service_key: service_key.into(),
            http,
        }
    }

    pub async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let endpoint = format!("{}/rest/v1/{}", self.base.trim_end_matches('/'), table);

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.service_key)
            .header("apikey", self.service_key.as_str())
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .with_context(|| format!("insert into {} failed", table))?;

        if !response.status().is_success() {
            anyhow::bail!("insert into {} failed: HTTP {}", table, response.status());
        }

        Ok(())
    }

    pub async fn fetch_by_id<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>> {
        let endpoint = format!("{}/rest/v1/{}", self.base.trim_end_matches('/'), table);
        let filter = format!("eq.{id}");

        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(&self.service_key)
            .header("apikey", self.service_key.as_str())
            .query(&[("id", filter.as_str()), ("limit", "1")])
            .send()
            .await
            .with_context(|| format!("select from {} failed", table))?;

        if !response.status().is_success() {
            anyhow::bail!("select from {} failed: HTTP {}", table, response.status());
        }

        let mut rows: Vec<T> = response
            .json()
            .await
            .with_context(|| format!("select from {} returned malformed JSON", table))?;

        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }
}
