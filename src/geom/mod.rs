//! Geometry: CRS handling, ESRI geometry conversion, buffers and the spatial join.

mod bbox;
mod buffer;
mod crs;
mod esri;
mod join;

pub use buffer::{build_buffers, BlockBuffer, Buffers};
pub use crs::{Crs, Reprojector};
pub use esri::esri_to_geometry;
pub use join::count_intersections;
