//! Run configuration: block source, master table, buffer radius and the list of
//! remote layers to enrich the table with.

use std::{collections::HashSet, path::{Path, PathBuf}, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const SITP_URL: &str =
    "https://serviciosgis.catastrobogota.gov.co/arcgis/rest/services/movilidad/transportepublico/MapServer/5";
const PARQUES_URL: &str =
    "https://serviciosgis.catastrobogota.gov.co/arcgis/rest/services/recreaciondeporte/parquesyescenarios/MapServer/1";

/// Cadastral block layer used by `download-blocks`.
pub const BLOCKS_URL: &str =
    "https://serviciosgis.catastrobogota.gov.co/arcgis/rest/services/catastro/manzana/MapServer/0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub blocks: BlockSourceConfig,

    /// Persisted master table (delimited text).
    pub table_path: PathBuf,

    /// Projected CRS used for buffering and intersection tests (meters).
    pub metric_epsg: u32,

    /// Catchment radius around every block, in units of `metric_epsg`.
    pub buffer_radius_m: f64,

    /// Fail a layer when more than this fraction of fetched features has no usable geometry.
    pub max_drop_ratio: Option<f64>,

    pub fetch: FetchConfig,

    pub layers: Vec<LayerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockSourceConfig {
    /// GeoJSON or Shapefile holding the block polygons.
    pub path: PathBuf,

    /// Expected layer name inside the container, checked when the file names its layer.
    pub layer: Option<String>,

    /// Attribute holding the block identifier.
    pub id_field: String,

    /// Declared CRS for files that do not carry one.
    pub epsg: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub page_size: usize,
    pub count_timeout_s: u64,
    pub page_timeout_s: u64,
    pub user_agent: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// One remote layer enriching the table with a `<name>_Count` / `<name>_Score` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerConfig {
    pub name: String,
    pub url: String,

    #[serde(rename = "where", default = "default_where")]
    pub where_clause: String,

    #[serde(default = "default_out_fields")]
    pub out_fields: String,

    /// Overrides `fetch.page_size` for this layer.
    #[serde(default)]
    pub page_size: Option<usize>,
}

fn default_where() -> String { "1=1".to_string() }
fn default_out_fields() -> String { "*".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            blocks: BlockSourceConfig::default(),
            table_path: PathBuf::from("tabla_manzanas.csv"),
            metric_epsg: 3116,
            buffer_radius_m: 800.0,
            max_drop_ratio: None,
            fetch: FetchConfig::default(),
            layers: vec![
                LayerConfig::new("SITP", SITP_URL),
                LayerConfig::new("PARQUES", PARQUES_URL),
            ],
        }
    }
}

impl Default for BlockSourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("manzanas.geojson"),
            layer: Some("manzanas".to_string()),
            id_field: "MANCODIGO".to_string(),
            epsg: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 2000,
            count_timeout_s: 60,
            page_timeout_s: 120,
            user_agent: concat!("blockscore/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay_ms: 500, max_delay_ms: 10_000 }
    }
}

impl FetchConfig {
    #[inline] pub fn count_timeout(&self) -> Duration { Duration::from_secs(self.count_timeout_s) }
    #[inline] pub fn page_timeout(&self) -> Duration { Duration::from_secs(self.page_timeout_s) }
}

impl LayerConfig {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            where_clause: default_where(),
            out_fields: default_out_fields(),
            page_size: None,
        }
    }
}

impl Config {
    /// Read a TOML configuration file. Missing keys fall back to the defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("[config] Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Keep only the named layers (case-insensitive), in configuration order.
    pub fn select_layers(&self, names: &[String]) -> Result<Vec<LayerConfig>, PipelineError> {
        if names.is_empty() { return Ok(self.layers.clone()) }

        for name in names {
            if !self.layers.iter().any(|layer| layer.name.eq_ignore_ascii_case(name)) {
                return Err(PipelineError::Config(format!("unknown layer {name:?}")));
            }
        }

        Ok(self.layers.iter()
            .filter(|layer| names.iter().any(|name| layer.name.eq_ignore_ascii_case(name)))
            .cloned()
            .collect())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        if !self.buffer_radius_m.is_finite() || self.buffer_radius_m < 0.0 {
            return fail(format!("buffer_radius_m must be a non-negative number, got {}", self.buffer_radius_m));
        }
        if self.fetch.page_size == 0 {
            return fail("fetch.page_size must be positive".into());
        }
        if self.fetch.retry.max_attempts == 0 {
            return fail("fetch.retry.max_attempts must be at least 1".into());
        }
        if let Some(ratio) = self.max_drop_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return fail(format!("max_drop_ratio must lie in [0, 1], got {ratio}"));
            }
        }
        if self.blocks.id_field.trim().is_empty() {
            return fail("blocks.id_field must not be empty".into());
        }
        if self.layers.is_empty() {
            return fail("at least one layer must be configured".into());
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if layer.name.is_empty() || !layer.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return fail(format!("layer name {:?} must be non-empty ASCII letters, digits or '_'", layer.name));
            }
            if !seen.insert(layer.name.to_ascii_uppercase()) {
                return fail(format!("duplicate layer name {:?}", layer.name));
            }
            if layer.page_size == Some(0) {
                return fail(format!("layer {}: page_size must be positive", layer.name));
            }
        }
        Ok(())
    }
}
