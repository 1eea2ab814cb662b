use std::fmt;

use anyhow::{anyhow, Context, Result};
use geo::{Coord, Geometry, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::error::PipelineError;

/// Coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs(u32);

impl Crs {
    pub const WGS84: Crs = Crs(4326);
    pub const MAGNA_BOGOTA: Crs = Crs(3116);

    /// Accept only codes with a known PROJ.4 definition.
    pub fn from_epsg(epsg: u32) -> Result<Self, PipelineError> {
        let crs = Crs(epsg);
        crs.proj4().map(|_| crs)
    }

    #[inline] pub fn epsg(&self) -> u32 { self.0 }

    /// Parse the names GeoJSON writers put in the legacy `crs` member:
    /// `EPSG:3116`, `urn:ogc:def:crs:EPSG::3116`, `urn:ogc:def:crs:OGC:1.3:CRS84`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.ends_with("CRS84") { return Some(Self::WGS84) }

        let upper = name.to_ascii_uppercase();
        let code = upper.strip_prefix("EPSG:")
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG::"))
            .or_else(|| upper.strip_prefix("URN:OGC:DEF:CRS:EPSG:").map(|rest| rest.rsplit(':').next().unwrap_or(rest)))?;
        code.trim().parse().ok().map(Crs)
    }

    /// `urn:ogc:def:crs:EPSG::<code>`, the form written into GeoJSON outputs.
    pub fn urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.0)
    }

    /// Geographic (degree-based) systems need radian conversion around proj4rs.
    pub fn is_geographic(&self) -> bool {
        matches!(self.0, 4326 | 4269 | 4686)
    }

    /// PROJ.4 definition for the supported codes.
    pub fn proj4(&self) -> Result<String, PipelineError> {
        let definition = match self.0 {
            4326 => "+proj=longlat +datum=WGS84 +no_defs +type=crs".to_string(),
            4269 => "+proj=longlat +datum=NAD83 +no_defs +type=crs".to_string(),
            // MAGNA-SIRGAS
            4686 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs".to_string(),
            // MAGNA-SIRGAS / Colombia Bogota zone
            3116 => "+proj=tmerc +lat_0=4.59620041666667 +lon_0=-74.0775079166667 +k=1 +x_0=1000000 +y_0=1000000 \
                     +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs".to_string(),
            // MAGNA-SIRGAS / Origen-Nacional
            9377 => "+proj=tmerc +lat_0=4 +lon_0=-73 +k=0.9992 +x_0=5000000 +y_0=2000000 \
                     +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs".to_string(),
            // WGS84 / UTM north and south
            code @ 32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs +type=crs", code - 32600),
            code @ 32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs +type=crs", code - 32700),
            code => return Err(PipelineError::Crs(format!("unsupported EPSG code {code}"))),
        };
        Ok(definition)
    }

    fn build(&self) -> Result<Proj4> {
        let proj_string = self.proj4()?;
        Proj4::from_proj_string(&proj_string)
            .with_context(|| anyhow!("failed to build PROJ.4: {proj_string}"))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Coordinate transformation between two [`Crs`].
pub struct Reprojector {
    from: Crs,
    to: Crs,
    projs: Option<(Proj4, Proj4)>, // None when from == to
}

impl Reprojector {
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        let projs = if from == to { None } else { Some((from.build()?, to.build()?)) };
        Ok(Self { from, to, projs })
    }

    #[inline] pub fn target(&self) -> Crs { self.to }

    /// Transform one coordinate. Degrees in and out for geographic systems.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let Some((from, to)) = &self.projs else { return Ok(coord) };

        let mut point = if self.from.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(from, to, &mut point)
            .map_err(|e| anyhow!("CRS transform {} -> {} failed at ({}, {}): {e:?}", self.from, self.to, coord.x, coord.y))?;

        Ok(if self.to.is_geographic() {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    pub fn geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        geometry.try_map_coords(|coord| self.coord(coord))
    }

    pub fn multipolygon(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord| self.coord(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crs_names() {
        assert_eq!(Crs::from_name("EPSG:3116"), Some(Crs(3116)));
        assert_eq!(Crs::from_name("urn:ogc:def:crs:EPSG::4686"), Some(Crs(4686)));
        assert_eq!(Crs::from_name("urn:ogc:def:crs:EPSG:6.6:4326"), Some(Crs(4326)));
        assert_eq!(Crs::from_name("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(Crs::WGS84));
        assert_eq!(Crs::from_name("WGS 84"), None);
    }

    #[test]
    fn rejects_unknown_codes() {
        assert!(Crs::from_epsg(3116).is_ok());
        assert!(Crs::from_epsg(32618).is_ok());
        assert!(Crs::from_epsg(27700).is_err());
    }

    #[test]
    fn identity_leaves_coordinates_untouched() {
        let reproject = Reprojector::new(Crs::MAGNA_BOGOTA, Crs::MAGNA_BOGOTA).unwrap();
        let coord = Coord { x: 1000123.5, y: 999876.25 };
        assert_eq!(reproject.coord(coord).unwrap(), coord);
    }

    #[test]
    fn bogota_origin_maps_to_false_origin() {
        let reproject = Reprojector::new(Crs::WGS84, Crs::MAGNA_BOGOTA).unwrap();
        let origin = reproject.coord(Coord { x: -74.0775079166667, y: 4.59620041666667 }).unwrap();
        assert!((origin.x - 1_000_000.0).abs() < 1.0, "x = {}", origin.x);
        assert!((origin.y - 1_000_000.0).abs() < 1.0, "y = {}", origin.y);
    }

    #[test]
    fn round_trip_through_metric_system() {
        let forward = Reprojector::new(Crs::WGS84, Crs::MAGNA_BOGOTA).unwrap();
        let back = Reprojector::new(Crs::MAGNA_BOGOTA, Crs::WGS84).unwrap();
        let coord = Coord { x: -74.08, y: 4.65 };
        let result = back.coord(forward.coord(coord).unwrap()).unwrap();
        assert!((result.x - coord.x).abs() < 1e-7);
        assert!((result.y - coord.y).abs() < 1e-7);
    }

    #[test]
    fn one_kilometer_north_is_about_a_hundredth_of_a_degree() {
        let reproject = Reprojector::new(Crs::WGS84, Crs::MAGNA_BOGOTA).unwrap();
        let a = reproject.coord(Coord { x: -74.08, y: 4.60 }).unwrap();
        let b = reproject.coord(Coord { x: -74.08, y: 4.61 }).unwrap();
        let dy = b.y - a.y;
        assert!((dy - 1105.7).abs() < 5.0, "dy = {dy}");
    }
}
