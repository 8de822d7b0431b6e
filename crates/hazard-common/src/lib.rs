//! Common types and utilities shared across the hazard tile crates.

pub mod bbox;
pub mod error;
pub mod hazard;
pub mod severity;
pub mod tile;

pub use bbox::BoundingBox;
pub use error::{HazardError, HazardResult};
pub use hazard::{HazardPolygon, HazardSnapshot, Point, Ring};
pub use severity::SeverityCategory;
pub use tile::{TileAddress, TileBufferConfig};
