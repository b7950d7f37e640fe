use serde::{Deserialize, Serialize};

use crate::errors::CoachError;

/// Bank and corner-angle multipliers applied to symptom deltas.
///
/// Flat corners and long corners get larger changes, heavily banked and quick
/// corners smaller ones. All thresholds are in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub bank_low_deg: f64,
    pub bank_low_mult: f64,
    pub bank_mid_deg: f64,
    pub bank_mid_mult: f64,
    pub bank_high_mult: f64,
    pub angle_mid_deg: f64,
    pub angle_mid_mult: f64,
    pub angle_high_deg: f64,
    pub angle_high_mult: f64,
    pub angle_low_mult: f64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            bank_low_deg: 4.0,
            bank_low_mult: 1.25,
            bank_mid_deg: 12.0,
            bank_mid_mult: 1.0,
            bank_high_mult: 0.8,
            angle_mid_deg: 60.0,
            angle_mid_mult: 1.0,
            angle_high_deg: 120.0,
            angle_high_mult: 1.25,
            angle_low_mult: 0.85,
        }
    }
}

impl ScalingConfig {
    pub fn validate(&self) -> Result<(), CoachError> {
        let multipliers = [
            self.bank_low_mult,
            self.bank_mid_mult,
            self.bank_high_mult,
            self.angle_low_mult,
            self.angle_mid_mult,
            self.angle_high_mult,
        ];
        if multipliers.iter().any(|m| !m.is_finite() || *m <= 0.0) {
            return Err(CoachError::InvalidScaling {
                reason: "multipliers must be finite and positive".to_string(),
            });
        }
        if !(self.bank_low_deg.is_finite() && self.bank_mid_deg.is_finite())
            || self.bank_low_deg > self.bank_mid_deg
        {
            return Err(CoachError::InvalidScaling {
                reason: format!(
                    "bank_low_deg {} must not exceed bank_mid_deg {}",
                    self.bank_low_deg, self.bank_mid_deg
                ),
            });
        }
        if !(self.angle_mid_deg.is_finite() && self.angle_high_deg.is_finite())
            || self.angle_mid_deg > self.angle_high_deg
        {
            return Err(CoachError::InvalidScaling {
                reason: format!(
                    "angle_mid_deg {} must not exceed angle_high_deg {}",
                    self.angle_mid_deg, self.angle_high_deg
                ),
            });
        }
        Ok(())
    }

    pub fn bank_factor(&self, bank_deg: f64) -> f64 {
        if bank_deg <= self.bank_low_deg {
            self.bank_low_mult
        } else if bank_deg <= self.bank_mid_deg {
            self.bank_mid_mult
        } else {
            self.bank_high_mult
        }
    }

    pub fn angle_factor(&self, angle_deg: f64) -> f64 {
        if angle_deg >= self.angle_high_deg {
            self.angle_high_mult
        } else if angle_deg >= self.angle_mid_deg {
            self.angle_mid_mult
        } else {
            self.angle_low_mult
        }
    }

    pub fn scale_factor(&self, bank_deg: f64, angle_deg: f64) -> f64 {
        self.bank_factor(bank_deg) * self.angle_factor(angle_deg)
    }
}

/// Swap left/right side tokens of a parameter name, keeping the axle.
///
/// `LF` <-> `RF` and `LR` <-> `RR` are swapped when they appear as whole
/// `_`-separated tokens. Names without side tokens are returned unchanged.
pub fn mirror_parameter(parameter: &str) -> String {
    parameter
        .split('_')
        .map(|token| match token {
            "LF" => "RF",
            "RF" => "LF",
            "LR" => "RR",
            "RR" => "LR",
            other => other,
        })
        .collect::<Vec<_>>()
        .join("_")
}
