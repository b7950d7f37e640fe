// Rule and limit configuration documents
//
// Each document is resolved in order: an explicit path, a file of the same
// name in the user config directory, and finally the default embedded in the
// binary. Everything is validated once here; a `CoachConfig` that exists is
// safe to run the engine with.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::CoachError;
use crate::setup_assistant::geometry::{ScalingConfig, mirror_parameter};
use crate::setup_assistant::limits::{LimitTable, ParameterLimit, ParameterRegistry, SetupCategory};
use crate::setup_assistant::rules::{RuleBlock, SymptomRuleTable};
use crate::setup_assistant::temperature::{
    DEFAULT_DEADBAND_F, DEFAULT_TIER1_MAX_F, DEFAULT_TIER2_MAX_F, DEFAULT_VALID_MAX_F,
    DEFAULT_VALID_MIN_F, TemperatureCompensation,
};
use crate::track_metadata::TrackCatalog;

const APP_DIR_NAME: &str = "garage-coach";
pub const RULES_FILE_NAME: &str = "setup_rules.json";
pub const LIMITS_FILE_NAME: &str = "limits.json";
pub const TRACKS_FILE_NAME: &str = "tracks.json";

const DEFAULT_RULES: &str = include_str!("../../config/setup_rules.json");
const DEFAULT_LIMITS: &str = include_str!("../../config/limits.json");

const RULES_DOCUMENT: &str = "setup_rules";
const LIMITS_DOCUMENT: &str = "limits";

fn default_deadband_f() -> f64 {
    DEFAULT_DEADBAND_F
}

fn default_tier1_max_f() -> f64 {
    DEFAULT_TIER1_MAX_F
}

fn default_tier2_max_f() -> f64 {
    DEFAULT_TIER2_MAX_F
}

fn default_valid_min_f() -> f64 {
    DEFAULT_VALID_MIN_F
}

fn default_valid_max_f() -> f64 {
    DEFAULT_VALID_MAX_F
}

/// Temperature compensation section of the rules document.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TempCompDocument {
    #[serde(default = "default_deadband_f")]
    pub deadband_f: f64,
    #[serde(default = "default_tier1_max_f")]
    pub tier1_max_f: f64,
    #[serde(default = "default_tier2_max_f")]
    pub tier2_max_f: f64,
    #[serde(default = "default_valid_min_f")]
    pub valid_min_f: f64,
    #[serde(default = "default_valid_max_f")]
    pub valid_max_f: f64,
    #[serde(default)]
    pub hotter: Map<String, Value>,
    #[serde(default)]
    pub cooler: Map<String, Value>,
}

/// `setup_rules.json`: label map, symptom rules, temperature rule and scaling knobs.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RuleDocument {
    #[serde(default)]
    pub feel_key_map: Map<String, Value>,
    pub symptoms: Map<String, Value>,
    pub temp_comp: TempCompDocument,
    #[serde(default)]
    pub scaling: ScalingConfig,
}

/// `limits.json`: allowed parameters per category and limit families.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LimitsDocument {
    pub allowed_parameters: BTreeMap<SetupCategory, Vec<String>>,
    pub limits: Map<String, Value>,
}

impl RuleDocument {
    pub fn from_json_str(content: &str) -> Result<Self, CoachError> {
        serde_json::from_str(content).map_err(|e| CoachError::ConfigParseError {
            document: RULES_DOCUMENT.to_string(),
            source: e,
        })
    }
}

impl LimitsDocument {
    pub fn from_json_str(content: &str) -> Result<Self, CoachError> {
        serde_json::from_str(content).map_err(|e| CoachError::ConfigParseError {
            document: LIMITS_DOCUMENT.to_string(),
            source: e,
        })
    }
}

/// Validated, immutable engine configuration.
#[derive(Debug, Clone)]
pub struct CoachConfig {
    registry: ParameterRegistry,
    limits: LimitTable,
    rules: SymptomRuleTable,
    temperature: TemperatureCompensation,
    scaling: ScalingConfig,
}

impl CoachConfig {
    pub fn from_documents(
        rules: &RuleDocument,
        limits: &LimitsDocument,
    ) -> Result<Self, CoachError> {
        let registry = ParameterRegistry::new(&limits.allowed_parameters)?;

        let mut families = Vec::with_capacity(limits.limits.len());
        for (family, value) in &limits.limits {
            let limit: ParameterLimit =
                serde_json::from_value(value.clone()).map_err(|e| CoachError::MalformedConfig {
                    document: LIMITS_DOCUMENT.to_string(),
                    reason: format!("limit family {}: {}", family, e),
                })?;
            families.push((family.clone(), limit));
        }
        let limit_table = LimitTable::new(families)?;

        let mut labels = Vec::with_capacity(rules.feel_key_map.len());
        for (label, key) in &rules.feel_key_map {
            let key = key.as_str().ok_or_else(|| CoachError::MalformedConfig {
                document: RULES_DOCUMENT.to_string(),
                reason: format!("feel_key_map entry {} must map to a string", label),
            })?;
            labels.push((label.clone(), key.to_string()));
        }

        let mut symptoms = HashMap::with_capacity(rules.symptoms.len());
        for (key, block) in &rules.symptoms {
            let block = block.as_object().ok_or_else(|| CoachError::MalformedConfig {
                document: RULES_DOCUMENT.to_string(),
                reason: format!("symptom {} must be an object", key),
            })?;
            symptoms.insert(key.clone(), RuleBlock::from_document(RULES_DOCUMENT, block)?);
        }

        let temp = &rules.temp_comp;
        let temperature = TemperatureCompensation::new(
            temp.deadband_f,
            temp.tier1_max_f,
            temp.tier2_max_f,
            RuleBlock::from_document(RULES_DOCUMENT, &temp.hotter)?,
            RuleBlock::from_document(RULES_DOCUMENT, &temp.cooler)?,
        )?
        .with_valid_range(temp.valid_min_f, temp.valid_max_f)?;

        rules.scaling.validate()?;

        let config = Self {
            registry,
            limits: limit_table,
            rules: SymptomRuleTable::new(labels, symptoms),
            temperature,
            scaling: rules.scaling.clone(),
        };

        for parameter in config.unreachable_rule_parameters() {
            log::debug!(
                "Rule parameter {} is not in the allowed registry and will be filtered",
                parameter
            );
        }

        Ok(config)
    }

    pub fn from_json_strs(rules: &str, limits: &str) -> Result<Self, CoachError> {
        Self::from_documents(
            &RuleDocument::from_json_str(rules)?,
            &LimitsDocument::from_json_str(limits)?,
        )
    }

    /// Configuration built from the documents embedded in the binary.
    pub fn embedded() -> Result<Self, CoachError> {
        Self::from_json_strs(DEFAULT_RULES, DEFAULT_LIMITS)
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &LimitTable {
        &self.limits
    }

    pub fn rules(&self) -> &SymptomRuleTable {
        &self.rules
    }

    pub fn temperature(&self) -> &TemperatureCompensation {
        &self.temperature
    }

    pub fn scaling(&self) -> &ScalingConfig {
        &self.scaling
    }

    /// Rule parameters that can never reach a plan: neither the name nor its
    /// mirrored counterpart is allowed.
    pub fn unreachable_rule_parameters(&self) -> Vec<String> {
        let symptom_parameters = self
            .rules
            .blocks()
            .flat_map(|(_, block)| block.parameters());
        let temperature_parameters = self
            .temperature
            .hotter()
            .parameters()
            .chain(self.temperature.cooler().parameters());

        let mut unreachable: Vec<String> = symptom_parameters
            .chain(temperature_parameters)
            .filter(|p| {
                !self.registry.is_allowed(p) && !self.registry.is_allowed(&mirror_parameter(p))
            })
            .map(str::to_string)
            .collect();
        unreachable.sort();
        unreachable.dedup();
        unreachable
    }
}

/// Where to read each configuration document from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub rules: Option<PathBuf>,
    pub limits: Option<PathBuf>,
    pub tracks: Option<PathBuf>,
    /// Directory searched for overrides when no explicit path is given
    pub user_dir: Option<PathBuf>,
}

impl ConfigSources {
    /// Sources with the platform config directory as the override location.
    pub fn with_user_dir() -> Self {
        let user_dir = match Self::default_user_dir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                log::debug!("{}, using embedded configuration", e);
                None
            }
        };
        Self {
            user_dir,
            ..Default::default()
        }
    }

    pub fn default_user_dir() -> Result<PathBuf, CoachError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(CoachError::NoConfigDir)
    }

    fn resolve(&self, explicit: Option<&PathBuf>, file_name: &str) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.clone());
        }
        self.user_dir
            .as_ref()
            .map(|dir| dir.join(file_name))
            .filter(|path| path.exists())
    }

    fn read(path: &Path) -> Result<String, CoachError> {
        log::info!("Loading configuration from {:?}", path);
        fs::read_to_string(path).map_err(|e| CoachError::ConfigIOError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load_config(&self) -> Result<CoachConfig, CoachError> {
        let rules = match self.resolve(self.rules.as_ref(), RULES_FILE_NAME) {
            Some(path) => Self::read(&path)?,
            None => DEFAULT_RULES.to_string(),
        };
        let limits = match self.resolve(self.limits.as_ref(), LIMITS_FILE_NAME) {
            Some(path) => Self::read(&path)?,
            None => DEFAULT_LIMITS.to_string(),
        };
        CoachConfig::from_json_strs(&rules, &limits)
    }

    pub fn load_tracks(&self) -> Result<TrackCatalog, CoachError> {
        match self.resolve(self.tracks.as_ref(), TRACKS_FILE_NAME) {
            Some(path) => TrackCatalog::from_file(&path),
            None => TrackCatalog::embedded(),
        }
    }
}
