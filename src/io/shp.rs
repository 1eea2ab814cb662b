//! Shapefile block sources.

use std::{path::Path, sync::LazyLock};

use anyhow::{Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use regex::Regex;
use shapefile::{dbase::FieldValue, PolygonRing, Reader, Shape};

use super::number_text;
use crate::{blocks::Block, error::PipelineError, geom::Crs};

/// `(is_outer, closed coordinates)` of one shapefile ring.
macro_rules! ring_coords {
    ($ring:expr) => {{
        let ring = $ring;
        let mut coords: Vec<Coord<f64>> = ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect();
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }
        (matches!(ring, PolygonRing::Outer(_)), coords)
    }};
}

/// Read block polygons and their attribute identifier from a `.shp`/`.dbf` pair.
/// The CRS comes from the sibling `.prj`, when present and recognized.
pub(crate) fn read_blocks_shapefile(path: &Path, id_field: &str) -> Result<(Vec<Block>, Option<Crs>)> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[io::shp] Failed to open shapefile: {}", path.display()))?;

    let mut blocks = Vec::with_capacity(reader.shape_count()?);
    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.context("[io::shp] Error reading shape+record")?;

        let id = record.get(id_field)
            .and_then(field_to_text)
            .ok_or_else(|| PipelineError::schema(path, format!("record {i} has no {id_field} attribute")))?;

        let shape = match shape {
            Shape::NullShape => MultiPolygon::new(Vec::new()),
            Shape::Polygon(p) => rings_to_multipolygon(p.rings().iter().map(|ring| ring_coords!(ring))),
            Shape::PolygonM(p) => rings_to_multipolygon(p.rings().iter().map(|ring| ring_coords!(ring))),
            Shape::PolygonZ(p) => rings_to_multipolygon(p.rings().iter().map(|ring| ring_coords!(ring))),
            other => return Err(PipelineError::schema(path, format!(
                "record {i} ({id_field}={id}) has {:?} geometry, expected Polygon", other.shapetype()
            )).into()),
        };
        blocks.push(Block { id, shape });
    }

    let crs = match std::fs::read_to_string(path.with_extension("prj")) {
        Ok(wkt) => Some(crs_from_prj(&wkt)
            .ok_or_else(|| PipelineError::schema(path, "unrecognized coordinate system in .prj"))?),
        Err(_) => None,
    };

    Ok((blocks, crs))
}

/// Group each outer ring with the inner rings that follow it (shapefile ring order).
fn rings_to_multipolygon(rings: impl Iterator<Item = (bool, Vec<Coord<f64>>)>) -> MultiPolygon<f64> {
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    for (is_outer, coords) in rings {
        let ls = LineString::new(coords);
        if is_outer {
            if let Some(ext) = current_exterior.take() {
                polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    MultiPolygon::new(polys)
}

/// dBase values as identifier text; integral numerics lose their decimals.
fn field_to_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        FieldValue::Numeric(Some(n)) => Some(number_text(*n)),
        FieldValue::Float(Some(n)) => Some(number_text(f64::from(*n))),
        FieldValue::Double(n) => Some(number_text(*n)),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

static AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
});

static UTM_ZONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^WGS_1984_UTM_Zone_(\d{1,2})([NS])$"#).expect("valid regex")
});

/// EPSG code of a `.prj` WKT string.
///
/// OGC WKT carries `AUTHORITY["EPSG", ...]` entries, the last one naming the outer system.
/// ESRI WKT carries only names, so the usual Colombian and WGS84 names are matched directly.
fn crs_from_prj(wkt: &str) -> Option<Crs> {
    if let Some(code) = AUTHORITY.captures_iter(wkt).last() {
        return code[1].parse().ok().and_then(|epsg| Crs::from_epsg(epsg).ok());
    }

    let name = wkt.trim_start()
        .split_once('[')
        .map(|(_, rest)| rest.split('"').nth(1).unwrap_or_default())?;

    let epsg = match name {
        "MAGNA_Colombia_Bogota" | "MAGNA-SIRGAS_Colombia_Bogota" => 3116,
        "MAGNA-SIRGAS_Origen-Nacional" | "MAGNA-SIRGAS_CMT12" => 9377,
        "GCS_MAGNA" | "MAGNA-SIRGAS" => 4686,
        "GCS_WGS_1984" | "WGS 84" => 4326,
        "GCS_North_American_1983" => 4269,
        name => {
            let zone = UTM_ZONE.captures(name)?;
            let number: u32 = zone[1].parse().ok()?;
            if &zone[2] == "N" { 32600 + number } else { 32700 + number }
        }
    };
    Crs::from_epsg(epsg).ok()
}
