//! Upstream hazard polygon sources.
//!
//! A [`HazardSource`] turns a forecast day into a [`HazardSnapshot`]:
//! - [`VectorHazardSource`] queries the polygon layer as GeoJSON
//! - [`RasterHazardSource`] reclassifies the pre-rendered layer image
//! - [`CachedHazardSource`] wraps either with a TTL snapshot cache
//!
//! [`HazardSnapshot`]: hazard_common::HazardSnapshot

pub mod cached;
pub mod classify;
pub mod geojson;
pub mod raster;
pub mod source;
pub mod timestamps;
pub mod vector;

pub use cached::CachedHazardSource;
pub use classify::classify;
pub use raster::RasterHazardSource;
pub use source::{DayLayers, HazardSource};
pub use vector::VectorHazardSource;
