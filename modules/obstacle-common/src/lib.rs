pub mod config;
pub mod error;
pub mod geo;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{AppConfig, DEFAULT_DUPLICATE_RADIUS_M};
pub use error::{ObstacleError, Result};
pub use geo::distance_meters;
pub use types::*;
