// Core data structures for track geometry

use serde::{Deserialize, Serialize};

/// Corner angle assumed when the track document does not give one.
pub const DEFAULT_ANGLE_DEG: f64 = 90.0;

/// Direction a corner is taken in. Rules are authored for left-handers.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CornerDirection {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
    /// Mixed or unknown direction, never mirrored
    #[default]
    #[serde(rename = "M")]
    Mixed,
}

impl CornerDirection {
    /// Parse from the first letter of a code such as `"L"`, `"right"` or `"M"`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('L') => CornerDirection::Left,
            Some('R') => CornerDirection::Right,
            _ => CornerDirection::Mixed,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CornerDirection::Left => "L",
            CornerDirection::Right => "R",
            CornerDirection::Mixed => "M",
        }
    }

    /// Whether side-labelled parameters must be swapped for this direction.
    pub fn mirrors(&self) -> bool {
        matches!(self, CornerDirection::Right)
    }
}

impl std::fmt::Display for CornerDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CornerDirection::Left => write!(f, "Left"),
            CornerDirection::Right => write!(f, "Right"),
            CornerDirection::Mixed => write!(f, "Mixed"),
        }
    }
}

/// One geometric corner of a track
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrackCorner {
    /// Corner identifier, unique within a track (e.g. "T1", "Bus Stop")
    pub name: String,
    #[serde(rename = "dir")]
    pub direction: CornerDirection,
    /// Track banking in degrees, non-negative
    pub bank_deg: f64,
    /// Total direction change through the corner, in (0, 360]
    pub angle_deg: f64,
}

impl TrackCorner {
    /// Create a new corner, validating its geometry
    pub fn new(
        name: String,
        direction: CornerDirection,
        bank_deg: f64,
        angle_deg: f64,
    ) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("corner name must not be empty".to_string());
        }
        if !bank_deg.is_finite() || bank_deg < 0.0 {
            return Err(format!("{}: bank_deg must be non-negative", name));
        }
        if !angle_deg.is_finite() || angle_deg <= 0.0 || angle_deg > 360.0 {
            return Err(format!("{}: angle_deg must be in (0, 360]", name));
        }

        Ok(Self {
            name,
            direction,
            bank_deg,
            angle_deg,
        })
    }

    /// A corner with no geometry metadata: mixed direction, flat, 90°.
    pub fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: CornerDirection::Mixed,
            bank_deg: 0.0,
            angle_deg: DEFAULT_ANGLE_DEG,
        }
    }
}

/// Ordered corner list and baseline temperature for one track
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrackGeometry {
    pub track_name: String,
    pub corners: Vec<TrackCorner>,
    /// Temperature the baseline setup was built for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_temp_f: Option<f64>,
}

impl TrackGeometry {
    pub fn new(track_name: String) -> Self {
        Self {
            track_name,
            corners: Vec::new(),
            baseline_temp_f: None,
        }
    }

    pub fn with_baseline_temp(mut self, baseline_temp_f: f64) -> Self {
        self.baseline_temp_f = Some(baseline_temp_f);
        self
    }

    pub fn add_corner(&mut self, corner: TrackCorner) {
        self.corners.push(corner);
    }

    pub fn get_corner(&self, name: &str) -> Option<&TrackCorner> {
        self.corners.iter().find(|c| c.name == name)
    }

    /// Validate that corner names are unique
    pub fn validate_corners(&self) -> Result<(), String> {
        let mut names = std::collections::HashSet::new();
        for corner in &self.corners {
            if !names.insert(corner.name.as_str()) {
                return Err(format!(
                    "Duplicate corner name {} in {}",
                    corner.name, self.track_name
                ));
            }
        }
        Ok(())
    }
}
