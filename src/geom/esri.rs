//! ESRI JSON geometry payloads (ArcGIS REST) to `geo` geometries.

use geo::{Coord, Geometry, LineString, MultiLineString, Point, Polygon};
use serde_json::Value;

/// Convert one ESRI geometry payload.
///
/// Precedence: `x`/`y` → Point, `paths` → MultiLineString, `rings` → Polygon
/// (first ring exterior, the rest interiors, winding not interpreted).
/// Anything else, or malformed coordinates, yields `None`.
pub fn esri_to_geometry(payload: &Value) -> Option<Geometry<f64>> {
    let object = payload.as_object()?;

    if let (Some(x), Some(y)) = (object.get("x"), object.get("y")) {
        return Some(Point::new(x.as_f64()?, y.as_f64()?).into());
    }

    if let Some(paths) = object.get("paths") {
        let lines = parse_sequences(paths)?;
        return Some(MultiLineString::new(lines).into());
    }

    if let Some(rings) = object.get("rings") {
        let mut rings = parse_sequences(rings)?.into_iter();
        let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
        return Some(Polygon::new(exterior, rings.collect()).into());
    }

    None
}

/// `[[[x, y], ...], ...]` → one LineString per inner sequence.
fn parse_sequences(value: &Value) -> Option<Vec<LineString<f64>>> {
    value.as_array()?
        .iter()
        .map(|sequence| {
            sequence.as_array()?
                .iter()
                .map(parse_coord)
                .collect::<Option<Vec<_>>>()
                .map(LineString::new)
        })
        .collect()
}

/// `[x, y, (z), (m)]`; extra ordinates are ignored.
fn parse_coord(value: &Value) -> Option<Coord<f64>> {
    let ordinates = value.as_array()?;
    Some(Coord {
        x: ordinates.first()?.as_f64()?,
        y: ordinates.get(1)?.as_f64()?,
    })
}
