// Library interface for coachrs modules
// This allows integration tests to access the core functionality

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod export;
pub mod fatigue;
pub mod ingest;
pub mod load;
pub mod logging;
pub mod models;
pub mod notify;
pub mod report;
pub mod trend;

// Re-export commonly used types for convenience
pub use models::*;
pub use database::Database;
pub use engine::{CoachEngine, Decision, EngineConfig};
pub use estimator::{AdviceTier, SessionEstimate};
pub use fatigue::{FatigueConfig, FatigueScorer};
pub use load::LoadAggregator;
pub use notify::{ConsoleNotifier, Notifier};
pub use report::SummaryView;
pub use error::{CoachError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
