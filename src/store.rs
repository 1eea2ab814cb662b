//! Backing-store client: listing rows from a PostgREST view and public image URLs.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

const DEFAULT_BUCKET: &str = "listing-images";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub service_key: String,
    pub bucket: String,
}

impl StoreConfig {
    pub fn new(url: &str, service_key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }

    /// Read `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY` and `SUPABASE_BUCKET`.
    /// `None` when the URL or key is unset.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SUPABASE_URL").ok().filter(|v| !v.is_empty())?;
        let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok().filter(|v| !v.is_empty())?;
        let mut config = Self::new(&url, &key);
        if let Ok(bucket) = std::env::var("SUPABASE_BUCKET") {
            if !bucket.is_empty() { config.bucket = bucket }
        }
        Some(config)
    }

    /// Public object URL for a storage path; `None` for a missing or empty path.
    pub fn public_image_url(&self, path: Option<&str>) -> Option<String> {
        let path = path.filter(|path| !path.is_empty())?;
        Some(format!("{}/storage/v1/object/public/{}/{}", self.url, self.bucket, path.trim_start_matches('/')))
    }
}

#[derive(Debug, Clone)]
pub struct StoreClient {
    config: StoreConfig,
    client: reqwest::Client,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("[store] Failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    #[inline] pub fn config(&self) -> &StoreConfig { &self.config }

    /// `GET {url}/rest/v1/{view}?select={columns}&limit={limit}`
    pub async fn select_from_view(&self, view: &str, columns: &str, limit: usize) -> Result<Vec<Map<String, Value>>> {
        let url = format!("{}/rest/v1/{}", self.config.url, view);
        let resp = self.client.get(&url)
            .query(&[("select", columns.to_string()), ("limit", limit.to_string())])
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
            .send()
            .await
            .with_context(|| format!("[store] GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("[store] GET {url} returned {status}: {body}"));
        }

        resp.json::<Vec<Map<String, Value>>>()
            .await
            .with_context(|| format!("[store] {url} did not return a JSON array of rows"))
    }

    /// Rows of the `listings_feed` view with `cover_url` resolved from `cover_path`.
    pub async fn listings(&self, limit: usize) -> Result<Vec<Map<String, Value>>> {
        let mut rows = self.select_from_view("listings_feed", "*", limit).await?;
        for row in &mut rows {
            let cover = self.config.public_image_url(row.get("cover_path").and_then(Value::as_str));
            row.insert("cover_url".to_string(), cover.map_or(Value::Null, Value::String));
        }
        Ok(rows)
    }
}
