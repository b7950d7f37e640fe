// Error types for garage-coach

use crate::setup_assistant::SetupCategory;
use snafu::Snafu;
use std::{io, path::PathBuf};

#[derive(Debug, Snafu)]
pub enum CoachError {
    // Configuration errors, fatal at load time
    #[snafu(display(
        "Parameter {parameter} is allowed under both {first} and {second}, it must belong to exactly one category"
    ))]
    AmbiguousParameter {
        parameter: String,
        first: SetupCategory,
        second: SetupCategory,
    },
    #[snafu(display("Limit family {family} has a non-positive increment: {increment}"))]
    NonPositiveIncrement { family: String, increment: f64 },
    #[snafu(display("Limit family {family} has min {min} greater than max {max}"))]
    InvalidLimitBounds { family: String, min: f64, max: f64 },
    #[snafu(display("Invalid geometry scaling configuration: {reason}"))]
    InvalidScaling { reason: String },
    #[snafu(display("Invalid temperature compensation configuration: {reason}"))]
    InvalidTemperatureTiers { reason: String },
    #[snafu(display("Malformed {document} document: {reason}"))]
    MalformedConfig { document: String, reason: String },
    #[snafu(display("Error parsing {document} document"))]
    ConfigParseError {
        document: String,
        source: serde_json::Error,
    },
    #[snafu(display("Error reading configuration file {}", path.display()))]
    ConfigIOError { path: PathBuf, source: io::Error },
    #[snafu(display("Could not find application config directory"))]
    NoConfigDir,

    // Track geometry errors
    #[snafu(display("Track metadata validation failed: {reason}"))]
    TrackMetadataValidationError { reason: String },
    #[snafu(display("Track metadata storage error: {reason}"))]
    TrackMetadataStorageError { reason: String },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },

    // Errors for the plan writer
    #[snafu(display("Error writing plan file"))]
    WriterError { source: io::Error },
}

impl CoachError {
    /// Whether this error must stop the engine from initializing.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CoachError::AmbiguousParameter { .. }
                | CoachError::NonPositiveIncrement { .. }
                | CoachError::InvalidLimitBounds { .. }
                | CoachError::InvalidScaling { .. }
                | CoachError::InvalidTemperatureTiers { .. }
                | CoachError::MalformedConfig { .. }
                | CoachError::ConfigParseError { .. }
                | CoachError::ConfigIOError { .. }
                | CoachError::NoConfigDir
        )
    }
}
