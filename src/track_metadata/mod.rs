// Track geometry module
// Provides corner direction, banking and angle data for each track, loaded
// from a JSON catalog

pub mod storage;
pub mod types;

// Re-export commonly used types
pub use storage::TrackCatalog;
pub use types::{CornerDirection, TrackCorner, TrackGeometry};
