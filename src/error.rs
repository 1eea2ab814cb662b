use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single request against a remote layer query endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Body(String),

    /// ArcGIS reports query failures inside a successful HTTP response.
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },
}

impl TransportError {
    /// Whether the same request may succeed if issued again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(status) => *status == 408 || *status == 429 || *status >= 500,
            Self::Service { code, .. } => *code == 408 || *code == 429 || *code >= 500,
            Self::Body(_) => false,
        }
    }
}

/// Fatal pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("remote fetch from {url} failed after {attempts} attempt(s): {source}")]
    RemoteFetch {
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("invalid block source {}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },

    #[error("coordinate reference system: {0}")]
    Crs(String),

    #[error("layer {layer}: dropped {dropped} of {total} features without usable geometry (max ratio {max})")]
    DropRate { layer: String, dropped: usize, total: usize, max: f64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn schema(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Schema { path: path.into(), reason: reason.into() }
    }
}
