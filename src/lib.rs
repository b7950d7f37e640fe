// Library interface for garage-coach
// This allows integration tests and benches to access internal modules

pub mod config;
pub mod errors;
pub mod setup_assistant;
pub mod track_metadata;
pub mod writer;

// Re-export commonly used types
pub use config::{CoachConfig, ConfigSources};
pub use errors::CoachError;
pub use setup_assistant::{
    CornerFeedback, FeedbackSet, Plan, PlanRequest, RunType, SetupAssistant, SetupCategory,
    SuggestionLine, TemperatureContext,
};
pub use track_metadata::{CornerDirection, TrackCatalog, TrackCorner, TrackGeometry};
