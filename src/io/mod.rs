//! File formats: block sources (GeoJSON, Shapefile), GeoJSON exports, the CSV master table.

mod atomic;
pub(crate) mod csv;
mod geojson;
mod shp;

pub(crate) use atomic::write_atomic;
pub(crate) use geojson::{read_blocks_geojson, write_geojson};
pub(crate) use shp::read_blocks_shapefile;

/// Identifier text of a numeric field value; integral floats drop the fraction.
pub(crate) fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 { format!("{n:.0}") } else { n.to_string() }
}
