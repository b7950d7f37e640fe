// Track geometry catalog loading

use crate::errors::CoachError;
use crate::track_metadata::types::{CornerDirection, DEFAULT_ANGLE_DEG, TrackCorner, TrackGeometry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default track catalog shipped with the binary.
pub const DEFAULT_TRACKS: &str = include_str!("../../config/tracks.json");

/// Corner entry as written in a track document: a bare name or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCorner {
    Name(String),
    Detailed(RawCornerObject),
}

#[derive(Deserialize)]
struct RawCornerObject {
    #[serde(default, alias = "corner")]
    name: Option<String>,
    #[serde(default, alias = "direction")]
    dir: Option<String>,
    #[serde(default)]
    bank_deg: Option<f64>,
    #[serde(default)]
    angle_deg: Option<f64>,
}

#[derive(Deserialize)]
struct RawTrack {
    #[serde(default)]
    corners: Vec<RawCorner>,
    #[serde(default, alias = "baseline_temp")]
    baseline_temp_f: Option<f64>,
}

/// Read-only catalog of track geometry keyed by track name
#[derive(Debug, Clone, Default)]
pub struct TrackCatalog {
    tracks: BTreeMap<String, TrackGeometry>,
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog embedded in the binary
    pub fn embedded() -> Result<Self, CoachError> {
        Self::from_json_str(DEFAULT_TRACKS)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoachError> {
        log::debug!("Loading track catalog from {:?}", path);
        let content = fs::read_to_string(path).map_err(|e| CoachError::ConfigIOError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// Parse a `{track name -> {corners, baseline_temp_f}}` document
    pub fn from_json_str(content: &str) -> Result<Self, CoachError> {
        let raw: BTreeMap<String, RawTrack> =
            serde_json::from_str(content).map_err(|e| CoachError::TrackMetadataStorageError {
                reason: format!("Failed to parse track document: {}", e),
            })?;

        let mut catalog = Self::new();
        for (track_name, raw_track) in raw {
            let geometry = Self::build_geometry(track_name, raw_track)?;
            catalog.insert(geometry);
        }
        Ok(catalog)
    }

    fn build_geometry(track_name: String, raw_track: RawTrack) -> Result<TrackGeometry, CoachError> {
        let mut geometry = TrackGeometry::new(track_name);
        geometry.baseline_temp_f = raw_track.baseline_temp_f;

        if raw_track.corners.is_empty() {
            geometry.add_corner(TrackCorner::unknown("T1"));
            return Ok(geometry);
        }

        for (i, raw_corner) in raw_track.corners.into_iter().enumerate() {
            let corner = match raw_corner {
                RawCorner::Name(name) => TrackCorner::unknown(&name),
                RawCorner::Detailed(detail) => {
                    let name = detail
                        .name
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| format!("Corner {}", i + 1));
                    let direction = detail
                        .dir
                        .as_deref()
                        .map(CornerDirection::from_code)
                        .unwrap_or_default();
                    // a zero angle is treated the same as a missing one
                    let angle_deg = detail
                        .angle_deg
                        .filter(|a| *a != 0.0)
                        .unwrap_or(DEFAULT_ANGLE_DEG);
                    TrackCorner::new(name, direction, detail.bank_deg.unwrap_or(0.0), angle_deg)
                        .map_err(|reason| CoachError::TrackMetadataValidationError {
                            reason: format!("{}: {}", geometry.track_name, reason),
                        })?
                }
            };
            geometry.add_corner(corner);
        }

        geometry
            .validate_corners()
            .map_err(|reason| CoachError::TrackMetadataValidationError { reason })?;
        Ok(geometry)
    }

    pub fn insert(&mut self, geometry: TrackGeometry) {
        self.tracks.insert(geometry.track_name.clone(), geometry);
    }

    /// Look a track up by exact name, then by normalized name
    pub fn get(&self, track_name: &str) -> Option<&TrackGeometry> {
        if let Some(geometry) = self.tracks.get(track_name) {
            return Some(geometry);
        }
        let wanted = Self::normalize_track_name(track_name);
        self.tracks
            .values()
            .find(|g| Self::normalize_track_name(&g.track_name) == wanted)
    }

    /// List all track names, sorted
    pub fn list_available_tracks(&self) -> Vec<&str> {
        self.tracks.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Normalize track name for tolerant lookups
    pub fn normalize_track_name(track_name: &str) -> String {
        track_name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    }
}
