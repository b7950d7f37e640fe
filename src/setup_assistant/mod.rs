use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::CoachConfig;
use crate::errors::CoachError;
use crate::track_metadata::TrackGeometry;

pub mod geometry;
pub mod limits;
pub mod recommendations;
pub mod rules;
pub mod temperature;

#[cfg(test)]
mod recommendation_tests;

pub use geometry::{ScalingConfig, mirror_parameter};
pub use limits::{LimitTable, ParameterLimit, ParameterRegistry, SetupCategory};
pub use recommendations::{
    AppliedChange, CategorizedSuggestions, CornerContribution, DisplayPlan, Plan, RunType,
    SetupSheet, SuggestionLine,
};
pub use rules::{SeverityTier, SymptomRuleTable};
pub use temperature::{DEFAULT_BASELINE_TEMP_F, TemperatureCompensation, TemperatureContext};

/// Lowest accepted severity score. 0 means "no issue".
pub const MIN_SEVERITY: i32 = 0;
/// Highest accepted severity score.
pub const MAX_SEVERITY: i32 = 10;

/// One driver observation about a corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerFeedback {
    /// UI label or symptom key, e.g. "Loose on entry"
    #[serde(alias = "feels")]
    pub symptom: String,
    #[serde(default)]
    pub severity: i32,
    /// Free text, passed through to the plan
    #[serde(default)]
    pub note: String,
}

impl CornerFeedback {
    pub fn new(symptom: &str, severity: i32) -> Self {
        Self {
            symptom: symptom.to_string(),
            severity,
            note: String::new(),
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    /// Reject a severity outside the 0-10 scale.
    pub fn validate(&self, corner: &str) -> Result<(), CoachError> {
        if !(MIN_SEVERITY..=MAX_SEVERITY).contains(&self.severity) {
            return Err(CoachError::InvalidUserInput {
                field: format!("{}.severity", corner),
                reason: format!(
                    "{} is outside {}..{}",
                    self.severity, MIN_SEVERITY, MAX_SEVERITY
                ),
            });
        }
        Ok(())
    }
}

/// Driver feedback keyed by corner name.
pub type FeedbackSet = BTreeMap<String, CornerFeedback>;

/// Everything one recommendation run needs besides the static configuration.
#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub track_name: &'a str,
    /// `None` when the track is not in the catalog
    pub geometry: Option<&'a TrackGeometry>,
    pub feedback: &'a FeedbackSet,
    pub temperature: TemperatureContext,
    pub run_type: RunType,
}

impl<'a> PlanRequest<'a> {
    /// Request at the track's baseline temperature, for a practice run.
    pub fn new(
        track_name: &'a str,
        geometry: Option<&'a TrackGeometry>,
        feedback: &'a FeedbackSet,
    ) -> Self {
        let baseline_f = geometry
            .and_then(|g| g.baseline_temp_f)
            .unwrap_or(DEFAULT_BASELINE_TEMP_F);
        Self {
            track_name,
            geometry,
            feedback,
            temperature: TemperatureContext::new(baseline_f, baseline_f),
            run_type: RunType::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: TemperatureContext) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_current_temp(mut self, current_f: f64) -> Self {
        self.temperature.current_f = current_f;
        self
    }

    pub fn with_run_type(mut self, run_type: RunType) -> Self {
        self.run_type = run_type;
        self
    }
}

/// The setup recommendation engine.
///
/// Holds the validated rule and limit tables and turns a [`PlanRequest`] into
/// a [`Plan`]. `compute` performs no I/O and keeps no state between calls, so
/// one instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct SetupAssistant {
    config: CoachConfig,
}

impl SetupAssistant {
    pub fn new(config: CoachConfig) -> Self {
        Self { config }
    }

    /// Engine over the embedded default documents.
    pub fn with_defaults() -> Result<Self, CoachError> {
        Ok(Self::new(CoachConfig::embedded()?))
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    /// Compute a setup plan.
    ///
    /// Temperature compensation runs once, before any corner, and is neither
    /// scaled nor mirrored. Corners contribute in track order. Unknown
    /// symptoms, unlisted parameters and missing geometry contribute nothing;
    /// invalid severities and temperatures are skipped and reported in
    /// `input_warnings`.
    pub fn compute(&self, request: &PlanRequest) -> Plan {
        let temperature = request.temperature;
        let mut plan = Plan::new(
            request.track_name,
            request.run_type,
            temperature.baseline_f,
            temperature.current_f,
            self.config.limits(),
        );

        self.compensate_temperature(&mut plan, &temperature);

        match request.geometry {
            Some(geometry) => self.add_corner_feedback(&mut plan, geometry, request.feedback),
            None => {
                if !request.feedback.is_empty() {
                    log::debug!(
                        "No geometry for track {}, ignoring {} corner reports",
                        request.track_name,
                        request.feedback.len()
                    );
                }
            }
        }

        plan
    }

    fn compensate_temperature(&self, plan: &mut Plan, temperature: &TemperatureContext) {
        let compensation = self.config.temperature();
        if let Err(e) = compensation.validate(temperature) {
            let warning = match &e {
                CoachError::InvalidUserInput { field, reason } => {
                    format!("Temperature compensation skipped: {} {}", field, reason)
                }
                other => format!("Temperature compensation skipped: {}", other),
            };
            log::warn!("{}", warning);
            plan.input_warnings.push(warning);
            return;
        }

        let result = compensation.compensate(temperature.baseline_f, temperature.current_f);
        plan.temp_tier = result.tier;
        if let Some(direction) = result.direction() {
            plan.findings.push(format!(
                "Temperature: {}°F {} than baseline (tier {})",
                round_tenths(result.diff_f.abs()),
                direction,
                result.tier
            ));
        }

        for adjustment in result.adjustments {
            if let Some(line) =
                self.suggestion_line(adjustment.parameter, adjustment.delta, adjustment.units)
            {
                plan.recommendations.push(line);
            }
        }
    }

    fn add_corner_feedback(&self, plan: &mut Plan, geometry: &TrackGeometry, feedback: &FeedbackSet) {
        let rules = self.config.rules();

        for corner_name in feedback.keys() {
            if geometry.get_corner(corner_name).is_none() {
                log::debug!(
                    "Corner {} is not part of {}, ignoring its feedback",
                    corner_name,
                    geometry.track_name
                );
            }
        }

        for corner in &geometry.corners {
            let Some(report) = feedback.get(&corner.name) else {
                continue;
            };
            if let Err(e) = report.validate(&corner.name) {
                log::warn!("Skipping feedback: {}", e);
                plan.input_warnings.push(e.to_string());
                continue;
            }
            if report.severity == 0 || rules.is_no_issue(&report.symptom) {
                continue;
            }
            let Some(symptom_key) = rules.resolve_key(&report.symptom) else {
                log::debug!(
                    "Unknown symptom {:?} at {}, no contribution",
                    report.symptom,
                    corner.name
                );
                continue;
            };

            let tier = SeverityTier::from_severity(report.severity);
            let factor = self
                .config
                .scaling()
                .scale_factor(corner.bank_deg, corner.angle_deg);

            let suggestions: Vec<SuggestionLine> = rules
                .lookup(&symptom_key, tier)
                .into_iter()
                .filter_map(|adjustment| {
                    let parameter = if corner.direction.mirrors() {
                        mirror_parameter(&adjustment.parameter)
                    } else {
                        adjustment.parameter
                    };
                    self.suggestion_line(parameter, adjustment.delta * factor, adjustment.units)
                })
                .collect();

            for line in &suggestions {
                plan.recommendations.push(line.clone());
            }

            let contribution = CornerContribution {
                corner: corner.name.clone(),
                symptom: report.symptom.trim().to_string(),
                symptom_key,
                severity: report.severity,
                tier,
                note: report.note.clone(),
                direction: corner.direction,
                bank_deg: corner.bank_deg,
                angle_deg: corner.angle_deg,
                factor,
                suggestions,
            };
            plan.findings.push(contribution.finding());
            plan.corners_used.push(contribution);
        }
    }

    /// Whitelist, snap and zero-filter one adjustment.
    fn suggestion_line(&self, parameter: String, delta: f64, units: String) -> Option<SuggestionLine> {
        let Some(category) = self.config.registry().category_of(&parameter) else {
            log::debug!("Filtered suggestion for unlisted parameter {}", parameter);
            return None;
        };

        let delta = self.config.limits().snap(&parameter, delta);
        if delta == 0.0 {
            log::debug!("Change to {} snapped to zero, dropped", parameter);
            return None;
        }

        Some(SuggestionLine {
            parameter_name: parameter,
            category,
            delta,
            units,
        })
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
