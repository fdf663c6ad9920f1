//! Error types and handling for `canopy`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Supports `anyhow` integration at the edges
//! - Provides recovery hints for user-facing errors
//! - Provides structured JSON output for scripted callers
//!
//! Structural anomalies in issue data (orphans, cycles, missing fields) are
//! never errors; they are recovered inside the hierarchy builder. Only
//! input that is not an issue collection at all, configuration problems and
//! I/O failures surface here.

mod context;
mod structured;

pub use context::{OptionExt, ResultExt};
pub use structured::{ErrorCode, StructuredError, find_similar_keys};

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `canopy` operations.
#[derive(Error, Debug)]
pub enum CanopyError {
    // === Issue Errors ===
    /// No issue with the given key in the loaded set.
    #[error("Issue not found: {key}")]
    IssueNotFound { key: String },

    /// The issue source did not contain an issue collection.
    #[error("Unrecognized issue data in '{path}': {reason}")]
    SourceFormat { path: PathBuf, reason: String },

    // === Validation Errors ===
    /// Field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Unknown sort field.
    #[error("Invalid sort field: {field}")]
    InvalidSortField { field: String },

    /// Unknown activity period.
    #[error("Invalid activity period: {period}")]
    InvalidActivityPeriod { period: String },

    // === Configuration Errors ===
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workspace not initialized.
    #[error("canopy not initialized: run 'canopy init' first")]
    NotInitialized,

    /// Already initialized.
    #[error("Already initialized at '{path}'")]
    AlreadyInitialized { path: PathBuf },

    // === Persistence Errors ===
    /// Key-value store failure.
    #[error("Storage error for '{key}': {reason}")]
    Storage { key: String, reason: String },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Wrapped errors ===
    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CanopyError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::IssueNotFound { .. }
                | Self::Validation { .. }
                | Self::InvalidSortField { .. }
                | Self::InvalidActivityPeriod { .. }
                | Self::SourceFormat { .. }
                | Self::AlreadyInitialized { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run: canopy init"),
            Self::AlreadyInitialized { .. } => Some("Use --force to reinitialize"),
            Self::InvalidSortField { .. } => Some(
                "Valid sort fields: hierarchy, key, summary, status, priority, updated, created, assignee",
            ),
            Self::InvalidActivityPeriod { .. } => Some("Valid periods: 24h, 7d, off"),
            Self::SourceFormat { .. } => Some(
                "Expected an array of issues, a search response with an 'issues' array, or an array of pages",
            ),
            Self::IssueNotFound { .. } => Some("Check the key against the loaded query results"),
            _ => None,
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error for a key.
    #[must_use]
    pub fn storage(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using `CanopyError`.
pub type Result<T> = std::result::Result<T, CanopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CanopyError::IssueNotFound {
            key: "PROJ-123".to_string(),
        };
        assert_eq!(err.to_string(), "Issue not found: PROJ-123");
    }

    #[test]
    fn test_validation_error() {
        let err = CanopyError::validation("period", "must be 24h, 7d or off");
        assert_eq!(
            err.to_string(),
            "Validation failed: period: must be 24h, 7d or off"
        );
    }

    #[test]
    fn test_user_recoverable() {
        assert!(CanopyError::NotInitialized.is_user_recoverable());
        assert!(!CanopyError::storage("checkpoints", "disk full").is_user_recoverable());
    }

    #[test]
    fn test_suggestion() {
        assert_eq!(
            CanopyError::NotInitialized.suggestion(),
            Some("Run: canopy init")
        );
        let err = CanopyError::InvalidActivityPeriod {
            period: "1y".to_string(),
        };
        assert_eq!(err.suggestion(), Some("Valid periods: 24h, 7d, off"));
        assert!(CanopyError::Config("bad".to_string()).suggestion().is_none());
    }
}
