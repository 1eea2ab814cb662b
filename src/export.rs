//! GeoJSON exports: the downloaded block source and the per-block buffers.

use std::path::Path;

use anyhow::{Context, Result};
use geo::{Geometry, MultiPolygon};
use serde_json::{Map, Value};

use crate::{
    collection::FeatureCollection,
    geom::{Buffers, Crs},
    io,
    remote::{FeatureFetcher, LayerQuery, QueryTransport, OUTPUT_EPSG},
    table::BLOCK_ID_COLUMN,
};

/// Write every buffer as a `MANCODIGO`-tagged polygon in the buffers' CRS.
pub fn write_buffers(buffers: &Buffers, radius: f64, path: &Path) -> Result<()> {
    let features = buffers.buffers().iter()
        .map(|buffer| (block_properties(&buffer.block_id), Geometry::MultiPolygon(buffer.geometry.clone())))
        .collect::<Vec<_>>();

    io::write_geojson(path, &format!("buffer_{radius}m"), buffers.crs(), features.iter().map(|(p, g)| (p, g)))
        .with_context(|| format!("[export] Failed to write buffers to {}", path.display()))?;
    tracing::info!(buffers = features.len(), path = %path.display(), "wrote buffers");
    Ok(())
}

/// Download a block layer, project it into `metric` and write it as a block source.
///
/// Records without a polygon geometry or without an `id_field` attribute are skipped.
/// Returns the number of blocks written.
pub fn download_blocks<T: QueryTransport>(
    fetcher: &FeatureFetcher<T>,
    query: &LayerQuery,
    id_field: &str,
    metric: Crs,
    path: &Path,
) -> Result<usize> {
    let records = fetcher.fetch_all(query)?;
    let fetched = records.len();

    let collected = FeatureCollection::from_remote(records, Crs::from_epsg(OUTPUT_EPSG)?);
    let projected = collected.collection.to_crs(metric)?;

    let features = projected.features().iter()
        .filter_map(|feature| {
            let id = match feature.attributes.get(id_field)? {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let shape = match &feature.geometry {
                Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
                Geometry::MultiPolygon(mp) => mp.clone(),
                _ => return None,
            };
            Some((block_properties_named(id_field, &id), Geometry::MultiPolygon(shape)))
        })
        .collect::<Vec<_>>();

    let skipped = fetched - features.len();
    if skipped > 0 {
        tracing::warn!(skipped, fetched, "block records without polygon or identifier were skipped");
    }

    io::write_geojson(path, "manzanas", metric, features.iter().map(|(p, g)| (p, g)))
        .with_context(|| format!("[export] Failed to write blocks to {}", path.display()))?;
    tracing::info!(blocks = features.len(), %metric, path = %path.display(), "wrote block source");
    Ok(features.len())
}

fn block_properties(id: &str) -> Map<String, Value> {
    block_properties_named(BLOCK_ID_COLUMN, id)
}

fn block_properties_named(field: &str, id: &str) -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(field.to_string(), Value::String(id.to_string()));
    properties
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use geo::polygon;
    use serde_json::json;

    use super::*;
    use crate::{
        blocks::BlockSet,
        config::BlockSourceConfig,
        error::TransportError,
        geom::BlockBuffer,
        remote::RetryPolicy,
    };

    /// One page of two block polygons near Bogotá plus a point and an id-less polygon.
    struct BlockLayer;

    impl QueryTransport for BlockLayer {
        fn get_json(&self, _url: &str, params: &[(&str, String)], _timeout: Duration) -> Result<Value, TransportError> {
            if params.iter().any(|(k, _)| *k == "returnCountOnly") {
                return Ok(json!({"count": 4}));
            }
            let ring = |x: f64| json!([[[x, 4.60], [x + 0.001, 4.60], [x + 0.001, 4.601], [x, 4.601], [x, 4.60]]]);
            Ok(json!({"features": [
                {"attributes": {"MANCODIGO": "004501"}, "geometry": {"rings": ring(-74.08)}},
                {"attributes": {"MANCODIGO": 4502}, "geometry": {"rings": ring(-74.07)}},
                {"attributes": {"MANCODIGO": "004503"}, "geometry": {"x": -74.06, "y": 4.6}},
                {"attributes": {}, "geometry": {"rings": ring(-74.05)}},
            ]}))
        }
    }

    #[test]
    fn downloaded_blocks_load_as_block_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manzanas.geojson");
        let fetcher = FeatureFetcher::new(BlockLayer).with_retry(RetryPolicy::none());

        let written = download_blocks(&fetcher, &LayerQuery::new("http://blocks", 2000), "MANCODIGO", Crs::MAGNA_BOGOTA, &path).unwrap();
        assert_eq!(written, 2);

        let blocks = BlockSet::load(&BlockSourceConfig { path, ..BlockSourceConfig::default() }).unwrap();
        assert_eq!(blocks.crs(), Crs::MAGNA_BOGOTA);
        assert_eq!(blocks.ids(), vec!["004501", "4502"]);
    }

    #[test]
    fn buffers_are_written_with_their_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffers.geojson");
        let buffers = Buffers::new(Crs::MAGNA_BOGOTA, vec![BlockBuffer {
            block_id: "001".into(),
            geometry: MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]),
        }]);

        write_buffers(&buffers, 800.0, &path).unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["name"], json!("buffer_800m"));
        assert_eq!(written["crs"]["properties"]["name"], json!("urn:ogc:def:crs:EPSG::3116"));
        assert_eq!(written["features"][0]["properties"]["MANCODIGO"], json!("001"));
        assert_eq!(written["features"][0]["geometry"]["type"], json!("MultiPolygon"));
    }
}
