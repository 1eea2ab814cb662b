//! One parameterized enrichment run: blocks → buffers, then per layer
//! fetch → collect → join/count → score → merge, and a single table write.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{
    blocks::BlockSet,
    collection::{Collected, FeatureCollection},
    config::{Config, LayerConfig},
    error::PipelineError,
    geom::{build_buffers, count_intersections, Buffers, Crs},
    remote::{FeatureFetcher, LayerQuery, QueryTransport, OUTPUT_EPSG},
    table::MasterTable,
};

/// Outcome of one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerReport {
    pub name: String,
    /// Records returned by the remote service.
    pub fetched: usize,
    /// Records discarded for lacking a usable geometry.
    pub dropped: usize,
    /// Blocks whose buffer intersects at least one feature.
    pub matched_blocks: usize,
    /// Sum of all per-block counts.
    pub total_hits: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub blocks: usize,
    pub layers: Vec<LayerReport>,
}

pub struct Pipeline<T> {
    config: Config,
    fetcher: FeatureFetcher<T>,
}

impl<T: QueryTransport> Pipeline<T> {
    pub fn new(config: Config, fetcher: FeatureFetcher<T>) -> Self {
        Self { config, fetcher }
    }

    /// Pipeline fetching through `transport` with the configured timeouts and retry policy.
    pub fn with_transport(config: Config, transport: T) -> Self {
        let fetcher = FeatureFetcher::with_config(transport, &config.fetch);
        Self { config, fetcher }
    }

    #[inline] pub fn config(&self) -> &Config { &self.config }

    /// Enrich the master table with every layer in `layers`, in order.
    ///
    /// Block source problems fail before any request is issued. Any layer failure aborts
    /// the run and leaves the persisted table as it was.
    pub fn run(&self, layers: &[LayerConfig]) -> Result<RunReport> {
        self.config.validate()?;

        let blocks = BlockSet::load(&self.config.blocks)?;
        let metric = Crs::from_epsg(self.config.metric_epsg)?;
        let buffers = build_buffers(&blocks, metric, self.config.buffer_radius_m)?;
        let mut table = MasterTable::load_aligned(Some(&self.config.table_path), &blocks.ids())?;

        let mut reports = Vec::with_capacity(layers.len());
        for layer in layers {
            let report = self.run_layer(layer, &buffers, &mut table)
                .with_context(|| format!("[pipeline] layer {}", layer.name))?;
            reports.push(report);
        }

        table.save(&self.config.table_path)?;
        Ok(RunReport { blocks: blocks.len(), layers: reports })
    }

    fn run_layer(&self, layer: &LayerConfig, buffers: &Buffers, table: &mut MasterTable) -> Result<LayerReport> {
        let query = LayerQuery::from_layer(layer, self.config.fetch.page_size);
        let records = self.fetcher.fetch_all(&query)?;
        let fetched = records.len();

        let Collected { collection, dropped } = FeatureCollection::from_remote(records, Crs::from_epsg(OUTPUT_EPSG)?);
        self.check_drop_rate(&layer.name, dropped, fetched)?;

        let features = collection.to_crs(buffers.crs())?;
        let counts = count_intersections(buffers, &features)?;
        table.apply_layer(&layer.name, &counts)?;

        let report = LayerReport {
            name: layer.name.clone(),
            fetched,
            dropped,
            matched_blocks: counts.len(),
            total_hits: counts.values().map(|&n| u64::from(n)).sum(),
        };
        tracing::info!(
            layer = %report.name, fetched, dropped,
            matched_blocks = report.matched_blocks, total_hits = report.total_hits,
            "layer enriched"
        );
        Ok(report)
    }

    fn check_drop_rate(&self, layer: &str, dropped: usize, total: usize) -> Result<(), PipelineError> {
        if dropped > 0 {
            tracing::warn!(layer, dropped, total, "features without usable geometry were dropped");
        }
        match self.config.max_drop_ratio {
            Some(max) if total > 0 && dropped as f64 / total as f64 > max => {
                Err(PipelineError::DropRate { layer: layer.to_string(), dropped, total, max })
            }
            _ => Ok(()),
        }
    }
}
