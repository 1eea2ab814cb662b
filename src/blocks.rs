//! Cadastral blocks: the polygon universe every score is computed for.

use std::{collections::HashSet, path::Path};

use anyhow::Result;
use geo::MultiPolygon;

use crate::{config::BlockSourceConfig, error::PipelineError, geom::Crs, io};

/// A cadastral polygon keyed by its textual identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub shape: MultiPolygon<f64>, // empty when the source feature had no geometry
}

/// All blocks of one source, with their declared CRS.
#[derive(Debug, Clone)]
pub struct BlockSet {
    crs: Crs,
    blocks: Vec<Block>,
}

impl BlockSet {
    /// Build a block set, rejecting duplicate or empty identifiers.
    pub fn new(crs: Crs, blocks: Vec<Block>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::with_capacity(blocks.len());
        for block in &blocks {
            if block.id.is_empty() {
                return Err(schema_error("empty block identifier"));
            }
            if !seen.insert(block.id.as_str()) {
                return Err(schema_error(&format!("duplicate block identifier {:?}", block.id)));
            }
        }
        Ok(Self { crs, blocks })
    }

    /// Read blocks from a GeoJSON or Shapefile source, validating the schema.
    pub fn load(config: &BlockSourceConfig) -> Result<Self> {
        let path = config.path.as_path();
        let (blocks, declared) = match extension(path).as_deref() {
            Some("shp") => io::read_blocks_shapefile(path, &config.id_field)?,
            Some("geojson" | "json") => io::read_blocks_geojson(path, &config.id_field, config.layer.as_deref())?,
            other => return Err(PipelineError::schema(path, format!("unsupported block source format {other:?}")).into()),
        };

        let crs = match (declared, config.epsg) {
            (Some(file), Some(configured)) if file.epsg() != configured => {
                return Err(PipelineError::schema(path, format!(
                    "file declares {file} but configuration declares EPSG:{configured}"
                )).into());
            }
            (Some(file), _) => file,
            (None, Some(configured)) => Crs::from_epsg(configured)?,
            (None, None) => return Err(PipelineError::schema(path, "no coordinate reference system declared").into()),
        };

        let empty = blocks.iter().filter(|block| block.shape.0.is_empty()).count();
        if empty > 0 {
            tracing::warn!(empty, "blocks without geometry will score zero counts");
        }
        tracing::info!(blocks = blocks.len(), %crs, path = %path.display(), "loaded blocks");

        Self::new(crs, blocks).map_err(|err| match err {
            PipelineError::Schema { reason, .. } => PipelineError::schema(path, reason),
            other => other,
        }).map_err(Into::into)
    }

    #[inline] pub fn crs(&self) -> Crs { self.crs }
    #[inline] pub fn len(&self) -> usize { self.blocks.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.blocks.is_empty() }
    #[inline] pub fn blocks(&self) -> &[Block] { &self.blocks }

    /// Identifiers in source order.
    pub fn ids(&self) -> Vec<String> {
        self.blocks.iter().map(|block| block.id.clone()).collect()
    }
}

fn schema_error(reason: &str) -> PipelineError {
    PipelineError::schema("<blocks>", reason)
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::*;

    fn square(id: &str) -> Block {
        Block { id: id.into(), shape: MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]) }
    }

    #[test]
    fn rejects_duplicate_identifiers() {
        let err = BlockSet::new(Crs::MAGNA_BOGOTA, vec![square("001"), square("001")]).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }

    #[test]
    fn keeps_source_order_and_text_ids() {
        let set = BlockSet::new(Crs::MAGNA_BOGOTA, vec![square("0042"), square("A7"), square("1")]).unwrap();
        assert_eq!(set.ids(), vec!["0042", "A7", "1"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn unsupported_extension_is_a_schema_error() {
        let config = BlockSourceConfig { path: "blocks.gpkg".into(), ..BlockSourceConfig::default() };
        let err = BlockSet::load(&config).unwrap_err();
        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Schema { .. })));
    }
}
