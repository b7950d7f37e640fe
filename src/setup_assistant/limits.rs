use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::errors::CoachError;

/// Increment used for parameters that match no limit family (sway bar steps, notes).
pub const DEFAULT_INCREMENT: f64 = 1.0;

/// Tolerance used when checking that a value sits on an increment grid.
pub const SNAP_TOLERANCE: f64 = 1e-9;

const RESIDUE_SCALE: f64 = 1e9;

/// Categories of garage settings, in the order they are presented.
///
/// Every settable parameter belongs to exactly one category, as declared by the
/// allowed-parameter registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SetupCategory {
    /// Tire pressures
    Tires,
    /// Crossweight, ride heights, trackbar
    Chassis,
    /// Shocks, springs and sway bars
    Suspension,
    /// Differential and gearing
    RearEnd,
}

impl SetupCategory {
    pub const ALL: [SetupCategory; 4] = [
        SetupCategory::Tires,
        SetupCategory::Chassis,
        SetupCategory::Suspension,
        SetupCategory::RearEnd,
    ];

    /// Key used for this category in configuration and plan documents.
    pub fn key(&self) -> &'static str {
        match self {
            SetupCategory::Tires => "tires",
            SetupCategory::Chassis => "chassis",
            SetupCategory::Suspension => "suspension",
            SetupCategory::RearEnd => "rear_end",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key)
    }
}

impl std::fmt::Display for SetupCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupCategory::Tires => write!(f, "Tires"),
            SetupCategory::Chassis => write!(f, "Chassis"),
            SetupCategory::Suspension => write!(f, "Suspension"),
            SetupCategory::RearEnd => write!(f, "Rear End"),
        }
    }
}

/// Bounds and step size of one parameter family (pressure, shock clicks, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterLimit {
    pub min: f64,
    pub max: f64,
    pub increment: f64,
    /// Lowercase tokens that must all appear in a parameter name for this
    /// family to apply. Empty means the family key itself.
    #[serde(rename = "match", default, skip_serializing_if = "Vec::is_empty")]
    pub match_tokens: Vec<String>,
}

impl ParameterLimit {
    pub fn new(min: f64, max: f64, increment: f64) -> Self {
        Self {
            min,
            max,
            increment,
            match_tokens: Vec::new(),
        }
    }

    pub fn with_match_tokens(mut self, tokens: &[&str]) -> Self {
        self.match_tokens = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Round `value` to the nearest multiple of `increment`.
///
/// Exact half increments round away from zero. The result is cleaned of
/// floating point residue so `0.1 * 3` comes back as `0.3`.
pub fn snap_to_increment(value: f64, increment: f64) -> f64 {
    let snapped = (value / increment).round() * increment;
    let cleaned = (snapped * RESIDUE_SCALE).round() / RESIDUE_SCALE;
    // normalize -0.0
    if cleaned == 0.0 { 0.0 } else { cleaned }
}

/// Check that `value` is an integer multiple of `increment` within [`SNAP_TOLERANCE`].
pub fn is_multiple_of(value: f64, increment: f64) -> bool {
    let steps = value / increment;
    (steps - steps.round()).abs() <= SNAP_TOLERANCE
}

/// Result of applying a delta to an absolute setting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedTarget {
    pub target: f64,
    /// True when the unclamped target fell outside the family bounds.
    pub capped: bool,
}

/// Static bounds and increments per parameter family.
///
/// Families are matched against parameter names in declaration order; the
/// first family whose tokens all occur in the (lowercased) name wins.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitTable {
    families: Vec<(String, ParameterLimit)>,
}

impl LimitTable {
    pub fn new(families: Vec<(String, ParameterLimit)>) -> Result<Self, CoachError> {
        for (family, limit) in &families {
            if !limit.increment.is_finite() || limit.increment <= 0.0 {
                return Err(CoachError::NonPositiveIncrement {
                    family: family.clone(),
                    increment: limit.increment,
                });
            }
            if !limit.min.is_finite() || !limit.max.is_finite() {
                return Err(CoachError::MalformedConfig {
                    document: "limits".to_string(),
                    reason: format!("family {} has non-finite bounds", family),
                });
            }
            if limit.min > limit.max {
                return Err(CoachError::InvalidLimitBounds {
                    family: family.clone(),
                    min: limit.min,
                    max: limit.max,
                });
            }
        }

        Ok(Self { families })
    }

    /// Find the limit family governing a parameter name.
    pub fn family_for(&self, parameter: &str) -> Option<(&str, &ParameterLimit)> {
        let name = parameter.to_lowercase();
        self.families
            .iter()
            .find(|(family, limit)| {
                if limit.match_tokens.is_empty() {
                    name.contains(family.to_lowercase().as_str())
                } else {
                    limit
                        .match_tokens
                        .iter()
                        .all(|token| name.contains(token.to_lowercase().as_str()))
                }
            })
            .map(|(family, limit)| (family.as_str(), limit))
    }

    pub fn increment_for(&self, parameter: &str) -> f64 {
        self.family_for(parameter)
            .map(|(_, limit)| limit.increment)
            .unwrap_or(DEFAULT_INCREMENT)
    }

    /// Advisory `[min, max]` bounds for an absolute setting of this parameter.
    pub fn bounds_for(&self, parameter: &str) -> Option<(f64, f64)> {
        self.family_for(parameter)
            .map(|(_, limit)| (limit.min, limit.max))
    }

    /// Snap a delta to the parameter's increment grid.
    pub fn snap(&self, parameter: &str, value: f64) -> f64 {
        snap_to_increment(value, self.increment_for(parameter))
    }

    /// Apply a delta to an absolute current value, clamping into the family bounds.
    ///
    /// The target is snapped before clamping, so bounds that sit off the
    /// increment grid still hold.
    pub fn clamp_target(&self, parameter: &str, current: f64, delta: f64) -> ClampedTarget {
        let raw = self.snap(parameter, current + self.snap(parameter, delta));
        match self.family_for(parameter) {
            Some((_, limit)) => {
                let target = limit.clamp(raw);
                ClampedTarget {
                    target,
                    capped: target != raw,
                }
            }
            None => ClampedTarget {
                target: raw,
                capped: false,
            },
        }
    }

    pub fn families(&self) -> impl Iterator<Item = (&str, &ParameterLimit)> {
        self.families
            .iter()
            .map(|(family, limit)| (family.as_str(), limit))
    }
}

/// Whitelist of settable parameter names, indexed by name.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    index: HashMap<String, SetupCategory>,
    by_category: BTreeMap<SetupCategory, Vec<String>>,
}

impl ParameterRegistry {
    /// Build the registry, failing if any name is listed under two categories.
    pub fn new(allowed: &BTreeMap<SetupCategory, Vec<String>>) -> Result<Self, CoachError> {
        let mut index: HashMap<String, SetupCategory> = HashMap::new();
        let mut by_category: BTreeMap<SetupCategory, Vec<String>> = BTreeMap::new();

        for (category, names) in allowed {
            let listed = by_category.entry(*category).or_default();
            for name in names {
                match index.get(name) {
                    Some(existing) if existing != category => {
                        return Err(CoachError::AmbiguousParameter {
                            parameter: name.clone(),
                            first: *existing,
                            second: *category,
                        });
                    }
                    // listed twice under the same category
                    Some(_) => continue,
                    None => {
                        index.insert(name.clone(), *category);
                        listed.push(name.clone());
                    }
                }
            }
        }

        Ok(Self { index, by_category })
    }

    pub fn is_allowed(&self, parameter: &str) -> bool {
        self.index.contains_key(parameter)
    }

    pub fn category_of(&self, parameter: &str) -> Option<SetupCategory> {
        self.index.get(parameter).copied()
    }

    pub fn parameters(&self, category: SetupCategory) -> &[String] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
