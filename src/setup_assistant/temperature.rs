use serde::{Deserialize, Serialize};
use uom::si::f64::ThermodynamicTemperature;
use uom::si::thermodynamic_temperature::{degree_celsius, degree_fahrenheit};

use super::rules::{RawAdjustment, RuleBlock, SeverityTier};
use crate::errors::CoachError;

pub const DEFAULT_BASELINE_TEMP_F: f64 = 85.0;
pub const DEFAULT_DEADBAND_F: f64 = 5.0;
pub const DEFAULT_TIER1_MAX_F: f64 = 10.0;
pub const DEFAULT_TIER2_MAX_F: f64 = 20.0;
pub const DEFAULT_VALID_MIN_F: f64 = 40.0;
pub const DEFAULT_VALID_MAX_F: f64 = 150.0;

/// Baseline (setup) and current track temperature, in °F.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureContext {
    pub baseline_f: f64,
    pub current_f: f64,
}

impl TemperatureContext {
    pub fn new(baseline_f: f64, current_f: f64) -> Self {
        Self {
            baseline_f,
            current_f,
        }
    }

    pub fn from_celsius(baseline_c: f64, current_c: f64) -> Self {
        Self::new(celsius_to_fahrenheit(baseline_c), celsius_to_fahrenheit(current_c))
    }

    /// Signed difference, positive when the track is hotter than baseline.
    pub fn diff(&self) -> f64 {
        self.current_f - self.baseline_f
    }
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    ThermodynamicTemperature::new::<degree_celsius>(celsius).get::<degree_fahrenheit>()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureDirection {
    Hotter,
    Cooler,
}

impl std::fmt::Display for TemperatureDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemperatureDirection::Hotter => write!(f, "hotter"),
            TemperatureDirection::Cooler => write!(f, "cooler"),
        }
    }
}

/// Output of one temperature compensation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationResult {
    pub adjustments: Vec<RawAdjustment>,
    pub diff_f: f64,
    /// 0 inside the deadband, otherwise 1-3.
    pub tier: u8,
}

impl CompensationResult {
    pub fn direction(&self) -> Option<TemperatureDirection> {
        if self.tier == 0 {
            None
        } else if self.diff_f > 0.0 {
            Some(TemperatureDirection::Hotter)
        } else {
            Some(TemperatureDirection::Cooler)
        }
    }
}

/// Global temperature compensation rule.
///
/// The hotter and cooler blocks are authored independently; the cooler block
/// is not a negated hotter block. Compensation is applied once per run and is
/// never scaled by corner geometry or mirrored.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureCompensation {
    deadband_f: f64,
    tier1_max_f: f64,
    tier2_max_f: f64,
    valid_min_f: f64,
    valid_max_f: f64,
    hotter: RuleBlock,
    cooler: RuleBlock,
}

impl TemperatureCompensation {
    pub fn new(
        deadband_f: f64,
        tier1_max_f: f64,
        tier2_max_f: f64,
        hotter: RuleBlock,
        cooler: RuleBlock,
    ) -> Result<Self, CoachError> {
        let thresholds = [deadband_f, tier1_max_f, tier2_max_f];
        if thresholds.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(CoachError::InvalidTemperatureTiers {
                reason: "deadband and tier thresholds must be finite and non-negative".to_string(),
            });
        }
        if deadband_f > tier1_max_f || tier1_max_f > tier2_max_f {
            return Err(CoachError::InvalidTemperatureTiers {
                reason: format!(
                    "thresholds must increase: deadband {} <= tier1 {} <= tier2 {}",
                    deadband_f, tier1_max_f, tier2_max_f
                ),
            });
        }

        Ok(Self {
            deadband_f,
            tier1_max_f,
            tier2_max_f,
            valid_min_f: DEFAULT_VALID_MIN_F,
            valid_max_f: DEFAULT_VALID_MAX_F,
            hotter,
            cooler,
        })
    }

    /// Restrict the temperatures accepted from the driver.
    pub fn with_valid_range(mut self, min_f: f64, max_f: f64) -> Result<Self, CoachError> {
        if !min_f.is_finite() || !max_f.is_finite() || min_f > max_f {
            return Err(CoachError::InvalidTemperatureTiers {
                reason: format!("invalid temperature range {}..{}", min_f, max_f),
            });
        }
        self.valid_min_f = min_f;
        self.valid_max_f = max_f;
        Ok(self)
    }

    pub fn deadband_f(&self) -> f64 {
        self.deadband_f
    }

    pub fn valid_range_f(&self) -> (f64, f64) {
        (self.valid_min_f, self.valid_max_f)
    }

    pub fn hotter(&self) -> &RuleBlock {
        &self.hotter
    }

    pub fn cooler(&self) -> &RuleBlock {
        &self.cooler
    }

    /// Bucket a signed temperature difference by magnitude.
    pub fn tier_for(&self, diff_f: f64) -> u8 {
        let magnitude = diff_f.abs();
        if magnitude <= self.deadband_f {
            0
        } else if magnitude <= self.tier1_max_f {
            1
        } else if magnitude <= self.tier2_max_f {
            2
        } else {
            3
        }
    }

    pub fn compensate(&self, baseline_f: f64, current_f: f64) -> CompensationResult {
        let diff_f = current_f - baseline_f;
        let tier = self.tier_for(diff_f);

        let adjustments = match SeverityTier::from_temperature_tier(tier) {
            Some(severity) if diff_f > 0.0 => self.hotter.lookup(severity),
            Some(severity) => self.cooler.lookup(severity),
            None => Vec::new(),
        };

        CompensationResult {
            adjustments,
            diff_f,
            tier,
        }
    }

    /// Reject temperatures outside the accepted physical range.
    pub fn validate(&self, context: &TemperatureContext) -> Result<(), CoachError> {
        for (field, value) in [
            ("baseline_temp_f", context.baseline_f),
            ("current_temp_f", context.current_f),
        ] {
            if !value.is_finite() || value < self.valid_min_f || value > self.valid_max_f {
                return Err(CoachError::InvalidUserInput {
                    field: field.to_string(),
                    reason: format!(
                        "{} is outside {}..{} °F",
                        value, self.valid_min_f, self.valid_max_f
                    ),
                });
            }
        }
        Ok(())
    }
}
