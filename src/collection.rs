//! Geo-tagged feature collections built from raw remote records.

use anyhow::Result;
use geo::Geometry;
use serde_json::{Map, Value};

use crate::{
    geom::{esri_to_geometry, Crs, Reprojector},
    remote::RemoteFeature,
};

/// One row: the record's attributes plus its resolved geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub attributes: Map<String, Value>,
    pub geometry: Geometry<f64>,
}

/// Features sharing one declared CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    crs: Crs,
    features: Vec<GeoFeature>,
}

/// Result of [`FeatureCollection::from_remote`]: the clean collection and how many
/// records were discarded for lacking a usable geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub collection: FeatureCollection,
    pub dropped: usize,
}

impl FeatureCollection {
    pub fn new(crs: Crs, features: Vec<GeoFeature>) -> Self {
        Self { crs, features }
    }

    /// Resolve every record's ESRI geometry; records without one are left out and counted.
    pub fn from_remote(records: Vec<RemoteFeature>, crs: Crs) -> Collected {
        let total = records.len();
        let features = records.into_iter()
            .filter_map(|record| {
                let geometry = record.geometry.as_ref().and_then(esri_to_geometry)?;
                Some(GeoFeature { attributes: record.attributes, geometry })
            })
            .collect::<Vec<_>>();

        let dropped = total - features.len();
        if dropped > 0 {
            tracing::debug!(dropped, total, "records without usable geometry");
        }

        Collected { collection: Self { crs, features }, dropped }
    }

    /// Reproject every geometry into `target`.
    pub fn to_crs(&self, target: Crs) -> Result<Self> {
        if target == self.crs {
            return Ok(self.clone());
        }
        let reprojector = Reprojector::new(self.crs, target)?;
        let features = self.features.iter()
            .map(|feature| Ok(GeoFeature {
                attributes: feature.attributes.clone(),
                geometry: reprojector.geometry(&feature.geometry)?,
            }))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { crs: target, features })
    }

    #[inline] pub fn crs(&self) -> Crs { self.crs }
    #[inline] pub fn len(&self) -> usize { self.features.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }
    #[inline] pub fn features(&self) -> &[GeoFeature] { &self.features }
}
