//! Unified error hierarchy for coachrs
//!
//! Structured error types for the store adapter, ingestion, and the coaching
//! engine's delivery path, with severity/retryability hooks for the tracing
//! layer. Delivery failures are the one class the batch pass absorbs per
//! user; store failures always propagate and abort the pass.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all coachrs operations
#[derive(Debug, Error)]
pub enum CoachError {
    /// Store adapter errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Import/export errors
    #[error("Import/Export error: {0}")]
    ImportExport(#[from] ImportExportError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Store adapter errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection or open failed
    #[error("Database connection failed: {reason}")]
    ConnectionFailed { reason: String },

    /// Record not found
    #[error("Record not found: {table}.{id}")]
    NotFound { table: String, id: String },

    /// Constraint violation
    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },
}

/// Notification delivery errors
///
/// These are the per-user failures the batch pass counts and skips past;
/// they never abort a run.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The channel rejected or failed to deliver the message
    #[error("Delivery to user {user_id} failed: {reason}")]
    DeliveryFailed { user_id: i64, reason: String },

    /// The user has no usable delivery address
    #[error("User {user_id} has no delivery address")]
    NoAddress { user_id: i64 },
}

/// Import and export errors
#[derive(Debug, Error)]
pub enum ImportExportError {
    /// Format-specific parsing error
    #[error("Parse error in {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    /// Missing required data
    #[error("Missing required data: {field}")]
    MissingData { field: String },

    /// Field value outside its documented range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Export failed
    #[error("Export failed to {path}: {reason}")]
    ExportFailed { path: PathBuf, reason: String },

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for coachrs operations
pub type Result<T> = std::result::Result<T, CoachError>;

impl CoachError {
    /// Check if error is retryable
    ///
    /// Delivery failures are retryable by construction: the cooldown
    /// timestamp is only written after a successful send, so the next
    /// scheduled pass re-evaluates the same condition.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoachError::Database(DatabaseError::ConnectionFailed { .. })
                | CoachError::Notify(NotifyError::DeliveryFailed { .. })
                | CoachError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoachError::Database(DatabaseError::NotFound { .. }) => ErrorSeverity::Warning,
            CoachError::Notify(_) => ErrorSeverity::Warning,
            CoachError::Validation(_) => ErrorSeverity::Warning,
            CoachError::ImportExport(ImportExportError::InvalidValue { .. }) => {
                ErrorSeverity::Warning
            }
            CoachError::Database(_) => ErrorSeverity::Error,
            CoachError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            CoachError::Database(DatabaseError::ConnectionFailed { .. }) => {
                "Unable to open the coaching database. Please check your configuration."
                    .to_string()
            }
            CoachError::Notify(NotifyError::DeliveryFailed { user_id, .. }) => {
                format!(
                    "Could not deliver a message to user {}. It will be retried on the next run.",
                    user_id
                )
            }
            CoachError::ImportExport(ImportExportError::ParseError { path, reason }) => {
                format!("Could not read {}: {}", path.display(), reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
