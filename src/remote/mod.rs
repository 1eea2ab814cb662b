//! Retrieval of complete feature layers from ArcGIS-style REST query endpoints.

mod feature;
mod fetch;
mod retry;
mod transport;

pub use feature::RemoteFeature;
pub(crate) use feature::FeaturePage;
pub use fetch::{FeatureFetcher, LayerQuery, OUTPUT_EPSG};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, QueryTransport};
