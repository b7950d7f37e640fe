use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::limits::{LimitTable, ParameterLimit, SetupCategory};
use super::rules::SeverityTier;
use crate::track_metadata::CornerDirection;

/// Absolute garage values keyed by parameter name.
pub type SetupSheet = BTreeMap<String, f64>;

/// One atomic setup change, already snapped to its parameter's increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionLine {
    pub parameter_name: String,
    pub category: SetupCategory,
    pub delta: f64,
    pub units: String,
}

impl SuggestionLine {
    /// Garage-style display string, e.g. `RF_pressure: -2.5 psi`.
    pub fn display_line(&self) -> String {
        format!("{}: {:+} {}", self.parameter_name, self.delta, self.units)
            .trim_end()
            .to_string()
    }
}

impl std::fmt::Display for SuggestionLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_line())
    }
}

/// Suggestion lines grouped per category, each list in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizedSuggestions {
    #[serde(default)]
    pub tires: Vec<SuggestionLine>,
    #[serde(default)]
    pub chassis: Vec<SuggestionLine>,
    #[serde(default)]
    pub suspension: Vec<SuggestionLine>,
    #[serde(default)]
    pub rear_end: Vec<SuggestionLine>,
}

impl CategorizedSuggestions {
    pub fn get(&self, category: SetupCategory) -> &[SuggestionLine] {
        match category {
            SetupCategory::Tires => &self.tires,
            SetupCategory::Chassis => &self.chassis,
            SetupCategory::Suspension => &self.suspension,
            SetupCategory::RearEnd => &self.rear_end,
        }
    }

    fn get_mut(&mut self, category: SetupCategory) -> &mut Vec<SuggestionLine> {
        match category {
            SetupCategory::Tires => &mut self.tires,
            SetupCategory::Chassis => &mut self.chassis,
            SetupCategory::Suspension => &mut self.suspension,
            SetupCategory::RearEnd => &mut self.rear_end,
        }
    }

    /// Append a line to the list of its own category.
    pub fn push(&mut self, line: SuggestionLine) {
        self.get_mut(line.category).push(line);
    }

    /// All lines, category by category.
    pub fn iter(&self) -> impl Iterator<Item = &SuggestionLine> {
        SetupCategory::ALL
            .into_iter()
            .flat_map(move |category| self.get(category).iter())
    }

    pub fn len(&self) -> usize {
        self.tires.len() + self.chassis.len() + self.suspension.len() + self.rear_end.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kind of session the plan is meant for. Carried through unchanged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum RunType {
    #[default]
    Practice,
    Qualifying,
    Race,
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunType::Practice => write!(f, "Practice"),
            RunType::Qualifying => write!(f, "Qualifying"),
            RunType::Race => write!(f, "Race"),
        }
    }
}

/// What one corner fed into the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerContribution {
    pub corner: String,
    /// Label as entered by the driver
    pub symptom: String,
    pub symptom_key: String,
    pub severity: i32,
    pub tier: SeverityTier,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(rename = "dir")]
    pub direction: CornerDirection,
    pub bank_deg: f64,
    pub angle_deg: f64,
    pub factor: f64,
    pub suggestions: Vec<SuggestionLine>,
}

impl CornerContribution {
    pub fn finding(&self) -> String {
        let mut finding = format!(
            "{} ({}; bank {}°, angle {}°; scale x{:.2}): {} ({})",
            self.corner,
            self.direction,
            self.bank_deg,
            self.angle_deg,
            self.factor,
            self.symptom,
            self.tier
        );
        if !self.note.trim().is_empty() {
            finding.push_str(" - ");
            finding.push_str(self.note.trim());
        }
        finding
    }
}

/// Result of applying a plan's summed delta to one absolute setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub parameter_name: String,
    pub category: SetupCategory,
    pub delta: f64,
    /// Current value, `None` when the sheet does not carry this parameter
    pub current: Option<f64>,
    pub target: Option<f64>,
    pub capped: bool,
}

impl AppliedChange {
    pub fn display_line(&self) -> String {
        match (self.current, self.target) {
            (Some(current), Some(target)) if self.capped => format!(
                "{}: {} -> {} (capped at limit, requested {:+})",
                self.parameter_name, current, target, self.delta
            ),
            (Some(current), Some(target)) => {
                format!("{}: {} -> {}", self.parameter_name, current, target)
            }
            _ => format!(
                "{}: {:+} (not on setup sheet)",
                self.parameter_name, self.delta
            ),
        }
    }
}

/// Output of one recommendation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub track: String,
    pub run_type: RunType,
    pub baseline_temp_f: f64,
    pub current_temp_f: f64,
    pub temp_diff_f: f64,
    pub temp_tier: u8,
    pub findings: Vec<String>,
    pub recommendations: CategorizedSuggestions,
    pub corners_used: Vec<CornerContribution>,
    pub limits: BTreeMap<String, ParameterLimit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_warnings: Vec<String>,
}

/// Plan with every suggestion flattened to its display string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPlan {
    pub track: String,
    pub run_type: RunType,
    pub baseline_temp_f: f64,
    pub current_temp_f: f64,
    pub findings: Vec<String>,
    pub recommendations: BTreeMap<SetupCategory, Vec<String>>,
}

const WHY_THIS_HELPS: [&str; 3] = [
    "Auto Left/Right: LF/RF and LR/RR changes are mirrored on right-handers so the fix targets the loaded side.",
    "Banking/Angle scaling: bigger steps for flat or long corners, smaller steps for high-banked or quick bends.",
    "Keep tweaks small and re-test to avoid chasing your tail.",
];

const NEXT_RUN_CHECKLIST: [&str; 3] = [
    "Did each corner with a problem get better?",
    "Any new side effects elsewhere?",
    "If still off, take one more step in the same direction.",
];

impl Plan {
    /// An empty plan for a track, before any contribution is added.
    pub fn new(
        track: &str,
        run_type: RunType,
        baseline_temp_f: f64,
        current_temp_f: f64,
        limits: &LimitTable,
    ) -> Self {
        Self {
            track: track.to_string(),
            run_type,
            baseline_temp_f,
            current_temp_f,
            temp_diff_f: current_temp_f - baseline_temp_f,
            temp_tier: 0,
            findings: Vec::new(),
            recommendations: CategorizedSuggestions::default(),
            corners_used: Vec::new(),
            limits: limits
                .families()
                .map(|(family, limit)| (family.to_string(), limit.clone()))
                .collect(),
            input_warnings: Vec::new(),
        }
    }

    /// Whether any input produced a finding or a change.
    pub fn has_changes(&self) -> bool {
        !self.findings.is_empty() || !self.recommendations.is_empty()
    }

    pub fn display_lines(&self, category: SetupCategory) -> Vec<String> {
        self.recommendations
            .get(category)
            .iter()
            .map(SuggestionLine::display_line)
            .collect()
    }

    pub fn display_document(&self) -> DisplayPlan {
        DisplayPlan {
            track: self.track.clone(),
            run_type: self.run_type,
            baseline_temp_f: self.baseline_temp_f,
            current_temp_f: self.current_temp_f,
            findings: self.findings.clone(),
            recommendations: SetupCategory::ALL
                .into_iter()
                .map(|category| (category, self.display_lines(category)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text report: findings, changes per category, rationale and checklist.
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{} | {} | baseline {}°F, current {}°F\n",
            self.track, self.run_type, self.baseline_temp_f, self.current_temp_f
        );
        for warning in &self.input_warnings {
            out.push_str(&format!("Warning: {}\n", warning));
        }

        if !self.has_changes() {
            out.push_str("\nNo problems selected and temperature is near baseline. Nothing to change.\n");
            return out;
        }

        out.push_str("\nKey Findings\n");
        for finding in &self.findings {
            out.push_str(&format!("- {}\n", finding));
        }

        out.push_str("\nSetup Changes\n");
        if self.recommendations.is_empty() {
            out.push_str("- No allowed changes for these findings\n");
        }
        for category in SetupCategory::ALL {
            let lines = self.display_lines(category);
            if lines.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "{}\n{}\n",
                category,
                lines.iter().map(|l| format!("  - {}", l)).join("\n")
            ));
        }

        out.push_str("\nWhy This Helps\n");
        out.push_str(&WHY_THIS_HELPS.iter().map(|l| format!("- {}", l)).join("\n"));
        out.push_str("\n\nNext Run Checklist\n");
        out.push_str(&NEXT_RUN_CHECKLIST.iter().map(|l| format!("- {}", l)).join("\n"));
        out.push('\n');
        out
    }

    /// Sum the plan's deltas per parameter and apply them to absolute values.
    ///
    /// Targets are snapped to the parameter's increment, then clamped into
    /// its family bounds. Parameters missing from the sheet are returned without a
    /// target.
    pub fn apply_to(&self, limits: &LimitTable, sheet: &SetupSheet) -> Vec<AppliedChange> {
        let mut totals: Vec<(String, SetupCategory, f64)> = Vec::new();
        for line in self.recommendations.iter() {
            match totals
                .iter_mut()
                .find(|(name, _, _)| *name == line.parameter_name)
            {
                Some((_, _, delta)) => *delta += line.delta,
                None => totals.push((line.parameter_name.clone(), line.category, line.delta)),
            }
        }

        totals
            .into_iter()
            .map(|(parameter_name, category, delta)| {
                let delta = limits.snap(&parameter_name, delta);
                match sheet.get(&parameter_name) {
                    Some(current) => {
                        let clamped = limits.clamp_target(&parameter_name, *current, delta);
                        if clamped.capped {
                            log::warn!(
                                "{} change of {:+} capped at {}",
                                parameter_name,
                                delta,
                                clamped.target
                            );
                        }
                        AppliedChange {
                            parameter_name,
                            category,
                            delta,
                            current: Some(*current),
                            target: Some(clamped.target),
                            capped: clamped.capped,
                        }
                    }
                    None => AppliedChange {
                        parameter_name,
                        category,
                        delta,
                        current: None,
                        target: None,
                        capped: false,
                    },
                }
            })
            .collect()
    }
}
