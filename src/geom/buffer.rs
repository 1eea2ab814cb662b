//! Catchment buffers around blocks, computed in a metric CRS.

use anyhow::{ensure, Context, Result};
use geo::{Buffer, MultiPolygon};

use crate::{blocks::BlockSet, geom::{Crs, Reprojector}};

/// A block's catchment area.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockBuffer {
    pub block_id: String,
    pub geometry: MultiPolygon<f64>, // empty for blocks without geometry
}

/// One buffer per block, all in the same metric CRS.
#[derive(Debug, Clone)]
pub struct Buffers {
    crs: Crs,
    buffers: Vec<BlockBuffer>,
}

impl Buffers {
    pub fn new(crs: Crs, buffers: Vec<BlockBuffer>) -> Self {
        Self { crs, buffers }
    }

    #[inline] pub fn crs(&self) -> Crs { self.crs }
    #[inline] pub fn len(&self) -> usize { self.buffers.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.buffers.is_empty() }
    #[inline] pub fn buffers(&self) -> &[BlockBuffer] { &self.buffers }
}

/// Reproject every block into `metric` and expand it outward by `radius` metric units.
pub fn build_buffers(blocks: &BlockSet, metric: Crs, radius: f64) -> Result<Buffers> {
    ensure!(radius.is_finite() && radius >= 0.0, "[geom::buffer] invalid buffer radius {radius}");
    ensure!(!metric.is_geographic(), "[geom::buffer] {metric} is not a projected CRS");

    let reprojector = Reprojector::new(blocks.crs(), metric)?;
    let buffers = blocks.blocks().iter()
        .map(|block| {
            let projected = reprojector.multipolygon(&block.shape)
                .with_context(|| format!("[geom::buffer] reprojecting block {}", block.id))?;
            let geometry = if projected.0.is_empty() || radius == 0.0 {
                projected
            } else {
                projected.buffer(radius)
            };
            Ok(BlockBuffer { block_id: block.id.clone(), geometry })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(buffers = buffers.len(), radius, %metric, "built block buffers");
    Ok(Buffers { crs: metric, buffers })
}

#[cfg(test)]
mod tests {
    use geo::{polygon, Area, Contains, Point};

    use super::*;
    use crate::blocks::Block;

    fn blocks() -> BlockSet {
        BlockSet::new(Crs::MAGNA_BOGOTA, vec![
            Block {
                id: "001".into(),
                shape: MultiPolygon::new(vec![polygon![
                    (x: 1_000_000.0, y: 1_000_000.0), (x: 1_000_100.0, y: 1_000_000.0),
                    (x: 1_000_100.0, y: 1_000_100.0), (x: 1_000_000.0, y: 1_000_100.0),
                ]]),
            },
            Block { id: "002".into(), shape: MultiPolygon::new(Vec::new()) },
        ]).unwrap()
    }

    #[test]
    fn buffer_extends_by_radius() {
        let buffers = build_buffers(&blocks(), Crs::MAGNA_BOGOTA, 800.0).unwrap();
        assert_eq!(buffers.crs(), Crs::MAGNA_BOGOTA);
        assert_eq!(buffers.len(), 2);

        let buffer = &buffers.buffers()[0];
        assert_eq!(buffer.block_id, "001");
        assert!(buffer.geometry.contains(&Point::new(1_000_050.0, 1_000_899.0)));
        assert!(!buffer.geometry.contains(&Point::new(1_000_050.0, 1_000_901.0)));
        // square plus four 800 x 100 strips plus roughly a full circle at the corners
        let expected = 100.0 * 100.0 + 4.0 * 800.0 * 100.0 + std::f64::consts::PI * 800.0 * 800.0;
        assert!((buffer.geometry.unsigned_area() - expected).abs() / expected < 0.05);
    }

    #[test]
    fn blocks_without_geometry_keep_an_empty_buffer() {
        let buffers = build_buffers(&blocks(), Crs::MAGNA_BOGOTA, 800.0).unwrap();
        assert_eq!(buffers.buffers()[1].block_id, "002");
        assert!(buffers.buffers()[1].geometry.0.is_empty());
    }

    #[test]
    fn geographic_target_is_rejected() {
        assert!(build_buffers(&blocks(), Crs::WGS84, 800.0).is_err());
    }
}
