//! Spatial join of features against block buffers.

use std::collections::HashMap;

use anyhow::Result;
use geo::{BoundingRect, Intersects};
use rstar::RTree;

use crate::{
    collection::FeatureCollection,
    error::PipelineError,
    geom::{bbox::{envelope_of, BoundingBox}, buffer::Buffers},
};

/// Number of features intersecting each block's buffer (boundary included).
///
/// Only blocks with at least one match appear in the result; callers backfill zeros
/// against the full block universe.
pub fn count_intersections(buffers: &Buffers, features: &FeatureCollection) -> Result<HashMap<String, u32>> {
    if buffers.crs() != features.crs() {
        return Err(PipelineError::Crs(format!(
            "buffers are in {} but features are in {}", buffers.crs(), features.crs()
        )).into());
    }

    let rtree = RTree::bulk_load(
        buffers.buffers().iter().enumerate()
            .filter_map(|(i, buffer)| buffer.geometry.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
            .collect()
    );

    let mut counts: HashMap<String, u32> = HashMap::new();
    for feature in features.features() {
        let Some(rect) = feature.geometry.bounding_rect() else { continue };
        for candidate in rtree.locate_in_envelope_intersecting(&envelope_of(&rect)) {
            let buffer = &buffers.buffers()[candidate.idx()];
            if feature.geometry.intersects(&buffer.geometry) {
                *counts.entry(buffer.block_id.clone()).or_default() += 1;
            }
        }
    }

    Ok(counts)
}
