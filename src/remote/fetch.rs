use std::time::Duration;

use serde_json::Value;

use crate::{
    config::{FetchConfig, LayerConfig},
    error::{PipelineError, TransportError},
    remote::{FeaturePage, QueryTransport, RemoteFeature, RetryPolicy},
};

/// Geographic frame every page is requested in (WGS84 lon/lat).
pub const OUTPUT_EPSG: u32 = 4326;

/// What to fetch from one layer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerQuery {
    pub url: String,
    pub where_clause: String,
    pub out_fields: String,
    pub page_size: usize,
}

impl LayerQuery {
    pub fn new(url: &str, page_size: usize) -> Self {
        Self {
            url: url.to_string(),
            where_clause: "1=1".to_string(),
            out_fields: "*".to_string(),
            page_size,
        }
    }

    pub fn from_layer(layer: &LayerConfig, default_page_size: usize) -> Self {
        Self {
            url: layer.url.clone(),
            where_clause: layer.where_clause.clone(),
            out_fields: layer.out_fields.clone(),
            page_size: layer.page_size.unwrap_or(default_page_size),
        }
    }

    /// `<layer_url>/query`
    pub fn query_url(&self) -> String {
        format!("{}/query", self.url.trim_end_matches('/'))
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("where", self.where_clause.clone()),
            ("outFields", self.out_fields.clone()),
            ("returnGeometry", "true".to_string()),
            ("f", "json".to_string()),
        ]
    }

    pub(crate) fn count_params(&self) -> Vec<(&'static str, String)> {
        let mut params = self.base_params();
        params.push(("returnCountOnly", "true".to_string()));
        params
    }

    pub(crate) fn page_params(&self, offset: usize) -> Vec<(&'static str, String)> {
        let mut params = self.base_params();
        params.push(("resultOffset", offset.to_string()));
        params.push(("resultRecordCount", self.page_size.to_string()));
        params.push(("outSR", OUTPUT_EPSG.to_string()));
        params
    }

    /// Offsets of every page needed to cover `total` records.
    pub fn page_offsets(&self, total: usize) -> std::iter::StepBy<std::ops::Range<usize>> {
        (0..total).step_by(self.page_size.max(1))
    }
}

/// Retrieves complete layers through count-then-paginate queries.
#[derive(Debug, Clone)]
pub struct FeatureFetcher<T> {
    transport: T,
    retry: RetryPolicy,
    count_timeout: Duration,
    page_timeout: Duration,
}

impl<T: QueryTransport> FeatureFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &FetchConfig::default())
    }

    pub fn with_config(transport: T, config: &FetchConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::from(&config.retry),
            count_timeout: config.count_timeout(),
            page_timeout: config.page_timeout(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Issue one request under the retry policy.
    fn request(&self, url: &str, params: &[(&str, String)], timeout: Duration) -> Result<Value, PipelineError> {
        self.retry
            .run(|_| self.transport.get_json(url, params, timeout))
            .map_err(|(source, attempts)| PipelineError::RemoteFetch { url: url.to_string(), attempts, source })
    }

    /// Total number of records matching the layer's filter.
    pub fn fetch_count(&self, query: &LayerQuery) -> Result<usize, PipelineError> {
        let url = query.query_url();
        let body = self.request(&url, &query.count_params(), self.count_timeout)?;

        body.get("count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| PipelineError::RemoteFetch {
                url,
                attempts: 1,
                source: TransportError::Body(format!("count query returned no integer \"count\": {body}")),
            })
    }

    /// Fetch every feature of the layer. Any failed page aborts the whole fetch.
    pub fn fetch_all(&self, query: &LayerQuery) -> Result<Vec<RemoteFeature>, PipelineError> {
        let url = query.query_url();
        let total = self.fetch_count(query)?;
        tracing::info!(url = %url, total, page_size = query.page_size, "fetching layer");

        let mut features = Vec::with_capacity(total);
        for offset in query.page_offsets(total) {
            let body = self.request(&url, &query.page_params(offset), self.page_timeout)?;
            let page: FeaturePage = serde_json::from_value(body)
                .map_err(|e| PipelineError::RemoteFetch {
                    url: url.clone(),
                    attempts: 1,
                    source: TransportError::Body(e.to_string()),
                })?;

            let received = page.features.len();
            let expected = query.page_size.min(total - offset);
            if received < expected {
                // Services cap pages at their own maxRecordCount; the gap is not refetched.
                tracing::warn!(
                    offset, received, expected,
                    exceeded_transfer_limit = page.exceeded_transfer_limit,
                    "page returned fewer features than requested"
                );
            }

            features.extend(page.features);
            tracing::info!(fetched = features.len(), total, "downloaded page");
        }

        Ok(features)
    }
}
