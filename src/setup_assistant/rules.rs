use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::limits::SetupCategory;
use crate::errors::CoachError;

/// Symptom key meaning "nothing to fix at this corner".
pub const NO_ISSUE_KEY: &str = "no_issue";

/// Coarse severity bucket derived from a 0-10 driver score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Slight,
    Moderate,
    Severe,
}

impl SeverityTier {
    /// Highest score still considered slight.
    pub const SLIGHT_MAX: i32 = 3;
    /// Highest score still considered moderate.
    pub const MODERATE_MAX: i32 = 7;

    /// Bucket a severity score. Total over all integers: anything at or
    /// below 3 is slight, anything above 7 is severe.
    pub fn from_severity(severity: i32) -> Self {
        if severity <= Self::SLIGHT_MAX {
            SeverityTier::Slight
        } else if severity <= Self::MODERATE_MAX {
            SeverityTier::Moderate
        } else {
            SeverityTier::Severe
        }
    }

    /// Map a temperature compensation tier (1-3) onto a rule tier.
    pub fn from_temperature_tier(tier: u8) -> Option<Self> {
        match tier {
            1 => Some(SeverityTier::Slight),
            2 => Some(SeverityTier::Moderate),
            3 => Some(SeverityTier::Severe),
            _ => None,
        }
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityTier::Slight => write!(f, "slight"),
            SeverityTier::Moderate => write!(f, "moderate"),
            SeverityTier::Severe => write!(f, "severe"),
        }
    }
}

/// Per-tier delta of one parameter. A missing tier contributes nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierDeltas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severe: Option<f64>,
}

impl TierDeltas {
    pub fn new(slight: f64, moderate: f64, severe: f64) -> Self {
        Self {
            slight: Some(slight),
            moderate: Some(moderate),
            severe: Some(severe),
        }
    }

    /// One, two and three steps of `step`.
    pub fn steps(step: f64) -> Self {
        Self::new(step, step * 2.0, step * 3.0)
    }

    pub fn get(&self, tier: SeverityTier) -> Option<f64> {
        match tier {
            SeverityTier::Slight => self.slight,
            SeverityTier::Moderate => self.moderate,
            SeverityTier::Severe => self.severe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRule {
    #[serde(default)]
    pub units: String,
    pub delta: TierDeltas,
}

/// A single rule output before geometry scaling, mirroring and snapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAdjustment {
    pub category: SetupCategory,
    pub parameter: String,
    pub delta: f64,
    pub units: String,
}

#[derive(Debug, Clone, PartialEq)]
struct RuleEntry {
    category: SetupCategory,
    parameter: String,
    rule: ParameterRule,
}

/// Ordered set of parameter rules, grouped by category in the source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleBlock {
    entries: Vec<RuleEntry>,
}

impl RuleBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(
        mut self,
        category: SetupCategory,
        parameter: &str,
        units: &str,
        delta: TierDeltas,
    ) -> Self {
        self.entries.push(RuleEntry {
            category,
            parameter: parameter.to_string(),
            rule: ParameterRule {
                units: units.trim().to_string(),
                delta,
            },
        });
        self
    }

    /// Parse a `{category -> {parameter -> {units, delta}}}` object, keeping
    /// authoring order.
    pub fn from_document(document: &str, block: &Map<String, Value>) -> Result<Self, CoachError> {
        let mut rule_block = RuleBlock::new();

        for (category_key, parameters) in block {
            let category =
                SetupCategory::from_key(category_key).ok_or_else(|| CoachError::MalformedConfig {
                    document: document.to_string(),
                    reason: format!("unknown category {}", category_key),
                })?;
            let parameters = parameters
                .as_object()
                .ok_or_else(|| CoachError::MalformedConfig {
                    document: document.to_string(),
                    reason: format!("category {} must be an object", category_key),
                })?;

            for (parameter, rule) in parameters {
                let rule: ParameterRule = serde_json::from_value(rule.clone()).map_err(|e| {
                    CoachError::MalformedConfig {
                        document: document.to_string(),
                        reason: format!("rule for {}: {}", parameter, e),
                    }
                })?;
                rule_block = rule_block.with_rule(category, parameter, &rule.units, rule.delta);
            }
        }

        Ok(rule_block)
    }

    /// Raw adjustments for one tier, in authoring order.
    pub fn lookup(&self, tier: SeverityTier) -> Vec<RawAdjustment> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.rule.delta.get(tier) {
                Some(delta) => Some(RawAdjustment {
                    category: entry.category,
                    parameter: entry.parameter.clone(),
                    delta,
                    units: entry.rule.units.clone(),
                }),
                None => {
                    log::debug!("No {} delta for {}, skipping", tier, entry.parameter);
                    None
                }
            })
            .collect()
    }

    /// Parameter names referenced by this block.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.parameter.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Symptom rules keyed by a normalized symptom key, plus the UI label mapping.
#[derive(Debug, Clone, Default)]
pub struct SymptomRuleTable {
    labels: Vec<(String, String)>,
    symptoms: HashMap<String, RuleBlock>,
}

impl SymptomRuleTable {
    pub fn new(labels: Vec<(String, String)>, symptoms: HashMap<String, RuleBlock>) -> Self {
        Self { labels, symptoms }
    }

    /// Resolve a UI label (or a bare symptom key) to its symptom key.
    ///
    /// Labels match exactly first, then case-insensitively. Input that is
    /// already a key, or normalizes to one, resolves to itself.
    pub fn resolve_key(&self, label: &str) -> Option<String> {
        let label = label.trim();

        if let Some((_, key)) = self.labels.iter().find(|(l, _)| l == label) {
            return Some(key.clone());
        }
        if let Some((_, key)) = self
            .labels
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
        {
            return Some(key.clone());
        }

        let normalized = normalize_symptom_key(label);
        if normalized == NO_ISSUE_KEY
            || self.symptoms.contains_key(&normalized)
            || self.labels.iter().any(|(_, key)| *key == normalized)
        {
            return Some(normalized);
        }

        None
    }

    /// Whether the label means "skip this corner".
    pub fn is_no_issue(&self, label: &str) -> bool {
        label.trim().is_empty() || self.resolve_key(label).as_deref() == Some(NO_ISSUE_KEY)
    }

    /// Rule output for a symptom key at a tier; unknown keys yield nothing.
    pub fn lookup(&self, symptom_key: &str, tier: SeverityTier) -> Vec<RawAdjustment> {
        match self.symptoms.get(symptom_key) {
            Some(block) => block.lookup(tier),
            None => {
                log::debug!("No rules for symptom key {}", symptom_key);
                Vec::new()
            }
        }
    }

    pub fn block(&self, symptom_key: &str) -> Option<&RuleBlock> {
        self.symptoms.get(symptom_key)
    }

    /// UI labels and their symptom keys, in document order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels
            .iter()
            .map(|(label, key)| (label.as_str(), key.as_str()))
    }

    pub fn symptom_keys(&self) -> impl Iterator<Item = &str> {
        self.symptoms.keys().map(String::as_str)
    }

    pub(crate) fn blocks(&self) -> impl Iterator<Item = (&str, &RuleBlock)> {
        self.symptoms
            .iter()
            .map(|(key, block)| (key.as_str(), block))
    }
}

/// Lowercase, with every run of non-alphanumerics collapsed to `_`.
pub fn normalize_symptom_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            key.push(c);
        } else if !key.ends_with('_') {
            key.push('_');
        }
    }
    key.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loose_entry_block() -> RuleBlock {
        RuleBlock::new()
            .with_rule(
                SetupCategory::Tires,
                "LF_pressure",
                " psi",
                TierDeltas::steps(-0.5),
            )
            .with_rule(
                SetupCategory::Chassis,
                "crossweight_percent",
                "%",
                TierDeltas {
                    slight: Some(0.1),
                    moderate: None,
                    severe: Some(0.3),
                },
            )
    }

    fn test_table() -> SymptomRuleTable {
        let labels = vec![
            ("No issue / skip".to_string(), NO_ISSUE_KEY.to_string()),
            ("Loose on entry".to_string(), "loose_entry".to_string()),
            ("Other".to_string(), "other".to_string()),
        ];
        let mut symptoms = HashMap::new();
        symptoms.insert("loose_entry".to_string(), loose_entry_block());
        SymptomRuleTable::new(labels, symptoms)
    }

    #[test]
    fn test_severity_tier_breakpoints() {
        for severity in 0..=3 {
            assert_eq!(SeverityTier::from_severity(severity), SeverityTier::Slight);
        }
        for severity in 4..=7 {
            assert_eq!(SeverityTier::from_severity(severity), SeverityTier::Moderate);
        }
        for severity in 8..=10 {
            assert_eq!(SeverityTier::from_severity(severity), SeverityTier::Severe);
        }
    }

    #[test]
    fn test_temperature_tier_mapping() {
        assert_eq!(SeverityTier::from_temperature_tier(0), None);
        assert_eq!(
            SeverityTier::from_temperature_tier(1),
            Some(SeverityTier::Slight)
        );
        assert_eq!(
            SeverityTier::from_temperature_tier(3),
            Some(SeverityTier::Severe)
        );
        assert_eq!(SeverityTier::from_temperature_tier(4), None);
    }

    #[test]
    fn test_lookup_per_tier() {
        let block = loose_entry_block();

        let severe = block.lookup(SeverityTier::Severe);
        assert_eq!(severe.len(), 2);
        assert_eq!(severe[0].parameter, "LF_pressure");
        assert_eq!(severe[0].delta, -1.5);
        assert_eq!(severe[0].units, "psi");
        assert_eq!(severe[1].delta, 0.3);

        // moderate crossweight entry is missing, only the pressure remains
        let moderate = block.lookup(SeverityTier::Moderate);
        assert_eq!(moderate.len(), 1);
        assert_eq!(moderate[0].delta, -1.0);
    }

    #[test]
    fn test_resolve_labels_and_keys() {
        let table = test_table();
        assert_eq!(
            table.resolve_key("Loose on entry").as_deref(),
            Some("loose_entry")
        );
        assert_eq!(
            table.resolve_key("loose ON entry").as_deref(),
            Some("loose_entry")
        );
        assert_eq!(table.resolve_key("loose_entry").as_deref(), Some("loose_entry"));
        assert_eq!(table.resolve_key("Other").as_deref(), Some("other"));
        assert_eq!(table.resolve_key("Snap oversteer"), None);
    }

    #[test]
    fn test_no_issue_sentinel() {
        let table = test_table();
        assert!(table.is_no_issue("No issue / skip"));
        assert!(table.is_no_issue(""));
        assert!(table.is_no_issue("no_issue"));
        assert!(!table.is_no_issue("Loose on entry"));
    }

    #[test]
    fn test_unknown_symptom_yields_nothing() {
        let table = test_table();
        assert!(table.lookup("other", SeverityTier::Severe).is_empty());
        assert!(table.lookup("does_not_exist", SeverityTier::Slight).is_empty());
    }

    #[test]
    fn test_rule_block_from_document_keeps_order() {
        let document: Value = serde_json::from_str(
            r#"{
                "tires": {
                    "RR_pressure": {"units": " psi", "delta": {"slight": -0.5, "moderate": -1.0, "severe": -1.5}},
                    "LF_pressure": {"units": " psi", "delta": {"slight": -0.5}}
                },
                "rear_end": {
                    "diff_preload_ftlbs": {"units": " ft-lbs", "delta": {"severe": 15}}
                }
            }"#,
        )
        .unwrap();

        let block = RuleBlock::from_document("rules", document.as_object().unwrap()).unwrap();
        let parameters: Vec<&str> = block.parameters().collect();
        assert_eq!(
            parameters,
            vec!["RR_pressure", "LF_pressure", "diff_preload_ftlbs"]
        );

        let severe = block.lookup(SeverityTier::Severe);
        assert_eq!(severe.len(), 2);
        assert_eq!(severe[1].category, SetupCategory::RearEnd);
        assert_eq!(severe[1].units, "ft-lbs");
    }

    #[test]
    fn test_rule_block_rejects_unknown_category() {
        let document: Value =
            serde_json::from_str(r#"{"aero": {"rear_wing": {"delta": {"slight": 1}}}}"#).unwrap();
        let result = RuleBlock::from_document("rules", document.as_object().unwrap());
        assert!(matches!(result, Err(CoachError::MalformedConfig { .. })));
    }

    #[test]
    fn test_normalize_symptom_key() {
        assert_eq!(normalize_symptom_key("Porpoising / Bottoming"), "porpoising_bottoming");
        assert_eq!(normalize_symptom_key("  Tight mid-corner "), "tight_mid_corner");
        assert_eq!(normalize_symptom_key("no_issue"), "no_issue");
    }
}
