//! GeoJSON block sources and GeoJSON exports.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};

use super::number_text;
use crate::{blocks::Block, error::PipelineError, geom::Crs};

/// Read block polygons from a GeoJSON FeatureCollection.
/// Returns the blocks and the CRS declared by the legacy `crs` member, if any.
pub(crate) fn read_blocks_geojson(path: &Path, id_field: &str, layer: Option<&str>) -> Result<(Vec<Block>, Option<Crs>)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("[io::geojson] Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("[io::geojson] Failed to parse {}", path.display()))?;
    let schema = |reason: String| PipelineError::schema(path, reason);

    if value["type"].as_str() != Some("FeatureCollection") {
        return Err(schema("expected a GeoJSON FeatureCollection".into()).into());
    }

    if let (Some(expected), Some(name)) = (layer, value["name"].as_str()) {
        if expected != name {
            return Err(schema(format!("layer {expected:?} not found (file holds {name:?})")).into());
        }
    }

    let crs = match value["crs"]["properties"]["name"].as_str() {
        Some(name) => Some(Crs::from_name(name)
            .ok_or_else(|| schema(format!("unrecognized crs name {name:?}")))?),
        None => None,
    };

    let features = value["features"].as_array()
        .ok_or_else(|| schema("missing \"features\" array".into()))?;

    let blocks = features.iter().enumerate()
        .map(|(i, feature)| {
            let id = feature["properties"].get(id_field)
                .and_then(id_to_text)
                .ok_or_else(|| schema(format!("feature {i} has no {id_field} attribute")))?;
            let shape = match &feature["geometry"] {
                Value::Null => MultiPolygon::new(Vec::new()),
                geometry => parse_polygonal(geometry)
                    .with_context(|| format!("feature {i} ({id_field}={id})"))
                    .map_err(|e| schema(format!("{e:#}")))?,
            };
            Ok(Block { id, shape })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    Ok((blocks, crs))
}

/// Identifiers are kept as text: strings verbatim, integers as written, floats by [`number_text`].
fn id_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) if n.is_f64() => n.as_f64().map(number_text),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a Polygon or MultiPolygon GeoJSON geometry.
fn parse_polygonal(geometry: &Value) -> Result<MultiPolygon<f64>> {
    let coords = geometry["coordinates"].as_array()
        .ok_or_else(|| anyhow!("geometry has no coordinates"))?;

    match geometry["type"].as_str() {
        Some("Polygon") => Ok(MultiPolygon::new(vec![parse_polygon_coords(coords)?])),
        Some("MultiPolygon") => Ok(MultiPolygon::new(
            coords.iter()
                .map(|polygon| {
                    polygon.as_array()
                        .ok_or_else(|| anyhow!("invalid MultiPolygon member"))
                        .and_then(|rings| parse_polygon_coords(rings))
                })
                .collect::<Result<Vec<_>>>()?
        )),
        other => Err(anyhow!("expected Polygon or MultiPolygon geometry, found {other:?}")),
    }
}

/// `[exterior, hole, hole, ...]`
fn parse_polygon_coords(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.as_array()
            .ok_or_else(|| anyhow!("invalid ring"))
            .and_then(|coords| parse_ring_coords(coords))
    });
    let exterior = rings.next()
        .ok_or_else(|| anyhow!("polygon without exterior ring"))??;
    Ok(Polygon::new(exterior, rings.collect::<Result<Vec<_>>>()?))
}

/// Parse a ring from GeoJSON coordinates. Format: [[x, y], [x, y], ...]
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    coords.iter()
        .map(|pair| {
            let x = pair[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
            let y = pair[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
            Ok(Coord { x, y })
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

/// GeoJSON geometry object for the geometry kinds this crate produces.
pub(crate) fn geometry_to_geojson(geometry: &Geometry<f64>) -> Result<Value> {
    fn line(ls: &LineString<f64>) -> Value {
        Value::Array(ls.coords().map(|c| json!([c.x, c.y])).collect())
    }
    fn polygon(p: &Polygon<f64>) -> Value {
        Value::Array(std::iter::once(p.exterior()).chain(p.interiors()).map(line).collect())
    }

    Ok(match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": [p.x(), p.y()]}),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": line(ls)}),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon(p)}),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon).collect::<Vec<_>>(),
        }),
        other => return Err(anyhow!("[io::geojson] unsupported geometry for export: {other:?}")),
    })
}

/// Write features as a named GeoJSON FeatureCollection declaring `crs`.
pub(crate) fn write_geojson<'a>(
    path: &Path,
    layer: &str,
    crs: Crs,
    features: impl IntoIterator<Item = (&'a Map<String, Value>, &'a Geometry<f64>)>,
) -> Result<()> {
    let features = features.into_iter()
        .map(|(properties, geometry)| Ok(json!({
            "type": "Feature",
            "properties": properties,
            "geometry": geometry_to_geojson(geometry)?,
        })))
        .collect::<Result<Vec<_>>>()?;

    let collection = json!({
        "type": "FeatureCollection",
        "name": layer,
        "crs": {"type": "name", "properties": {"name": crs.urn()}},
        "features": features,
    });

    let bytes = serde_json::to_vec(&collection)
        .context("[io::geojson] Failed to serialize GeoJSON")?;
    super::write_atomic(path, &bytes)
}
