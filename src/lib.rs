#![doc = "Blockscore public API"]
mod blocks;
mod collection;
mod config;
mod error;
mod export;
mod geom;
mod io;
mod pipeline;
mod remote;
mod score;
mod table;

pub mod api;
pub mod store;

#[doc(inline)]
pub use blocks::{Block, BlockSet};

#[doc(inline)]
pub use collection::{Collected, FeatureCollection, GeoFeature};

#[doc(inline)]
pub use config::{BlockSourceConfig, Config, FetchConfig, LayerConfig, RetryConfig, BLOCKS_URL};

#[doc(inline)]
pub use error::{PipelineError, TransportError};

#[doc(inline)]
pub use geom::{build_buffers, count_intersections, esri_to_geometry, BlockBuffer, Buffers, Crs, Reprojector};

#[doc(inline)]
pub use pipeline::{LayerReport, Pipeline, RunReport};

#[doc(inline)]
pub use remote::{FeatureFetcher, HttpTransport, LayerQuery, QueryTransport, RemoteFeature, RetryPolicy, OUTPUT_EPSG};

#[doc(inline)]
pub use score::{quintile_scores, quintile_scores_column};

#[doc(inline)]
pub use table::{count_column, score_column, MasterTable, BLOCK_ID_COLUMN};

#[doc(inline)]
pub use export::{download_blocks, write_buffers};
