pub mod config;
pub mod error;
pub mod geo;
pub mod types;

pub use config::{Config, DedupConfig};
pub use error::CivicError;
pub use geo::{bounding_box, haversine_km, BoundingBox};
pub use types::*;
