//! Structured error output for scripted callers.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

#![allow(clippy::option_if_let_else)]

use crate::error::CanopyError;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Workspace Errors (exit code 2) ===
    /// Workspace not initialized
    NotInitialized,
    /// Already initialized
    AlreadyInitialized,

    // === Issue Errors (exit code 3) ===
    /// Issue with specified key not found
    IssueNotFound,
    /// Source file did not hold an issue collection
    SourceFormat,

    // === Validation Errors (exit code 4) ===
    /// Field validation failed
    ValidationFailed,
    /// Unknown sort field
    InvalidSortField,
    /// Unknown activity period
    InvalidActivityPeriod,

    // === Storage Errors (exit code 6) ===
    /// Key-value store failure
    StorageError,

    // === Config Errors (exit code 7) ===
    /// Configuration error
    ConfigError,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal Errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::IssueNotFound => "ISSUE_NOT_FOUND",
            Self::SourceFormat => "SOURCE_FORMAT",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InvalidSortField => "INVALID_SORT_FIELD",
            Self::InvalidActivityPeriod => "INVALID_ACTIVITY_PERIOD",
            Self::StorageError => "STORAGE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether fixing the input and retrying can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed
                | Self::InvalidSortField
                | Self::InvalidActivityPeriod
                | Self::StorageError
        )
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 2: Workspace errors
    /// - 3: Issue errors
    /// - 4: Validation errors
    /// - 6: Storage errors
    /// - 7: Config errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotInitialized | Self::AlreadyInitialized => 2,
            Self::IssueNotFound | Self::SourceFormat => 3,
            Self::ValidationFailed | Self::InvalidSortField | Self::InvalidActivityPeriod => 4,
            Self::StorageError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `CanopyError`.
    #[must_use]
    pub fn from_error(err: &CanopyError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);
        let hint = err.suggestion().map(str::to_string);

        Self {
            code,
            message: err.to_string(),
            hint,
            retryable: code.is_retryable(),
            context,
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for a terminal: `Error: message` plus an optional hint line.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let (error_label, hint_label) = if color {
            ("Error:".red().bold().to_string(), "Hint:".yellow().to_string())
        } else {
            ("Error:".to_string(), "Hint:".to_string())
        };
        match &self.hint {
            Some(hint) => format!("{error_label} {}\n{hint_label} {hint}", self.message),
            None => format!("{error_label} {}", self.message),
        }
    }

    fn extract_code_and_context(err: &CanopyError) -> (ErrorCode, Option<Value>) {
        match err {
            CanopyError::NotInitialized => (ErrorCode::NotInitialized, None),
            CanopyError::AlreadyInitialized { path } => (
                ErrorCode::AlreadyInitialized,
                Some(json!({"path": path.display().to_string()})),
            ),
            CanopyError::IssueNotFound { key } => {
                (ErrorCode::IssueNotFound, Some(json!({"searched_key": key})))
            }
            CanopyError::SourceFormat { path, reason } => (
                ErrorCode::SourceFormat,
                Some(json!({"path": path.display().to_string(), "reason": reason})),
            ),
            CanopyError::Validation { field, reason } => (
                ErrorCode::ValidationFailed,
                Some(json!({"field": field, "reason": reason})),
            ),
            CanopyError::InvalidSortField { field } => (
                ErrorCode::InvalidSortField,
                Some(json!({"provided": field})),
            ),
            CanopyError::InvalidActivityPeriod { period } => (
                ErrorCode::InvalidActivityPeriod,
                Some(json!({"provided": period, "valid_values": ["24h", "7d", "off"]})),
            ),
            CanopyError::Storage { key, reason } => (
                ErrorCode::StorageError,
                Some(json!({"key": key, "reason": reason})),
            ),
            CanopyError::Config(_) => (ErrorCode::ConfigError, None),
            CanopyError::Io(_) => (ErrorCode::IoError, None),
            CanopyError::Json(_) => (ErrorCode::JsonError, None),
            CanopyError::Yaml(_) => (ErrorCode::YamlError, None),
            CanopyError::WithContext { source, .. } => {
                if source.downcast_ref::<std::io::Error>().is_some() {
                    (ErrorCode::IoError, None)
                } else {
                    (ErrorCode::InternalError, None)
                }
            }
            CanopyError::Other(_) => (ErrorCode::InternalError, None),
        }
    }
}

/// Edit distance over ASCII-uppercased bytes; tracker keys are ASCII.
fn edit_distance(a: &[u8], b: &[u8]) -> usize {
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, &left) in a.iter().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &right) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = (above + 1)
                .min(row[j] + 1)
                .min(diagonal + usize::from(!left.eq_ignore_ascii_case(&right)));
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Find keys similar to the searched key using Levenshtein distance.
///
/// Returns up to `max_suggestions` keys with distance <= 2. Comparison is
/// case-insensitive since tracker keys are upper-case but often typed lower.
#[must_use]
pub fn find_similar_keys(searched: &str, existing: &[String], max_suggestions: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &String)> = existing
        .iter()
        .filter_map(|key| {
            let distance = edit_distance(searched.as_bytes(), key.as_bytes());
            (distance <= 2).then_some((distance, key))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    candidates
        .into_iter()
        .take(max_suggestions)
        .map(|(_, key)| key.clone())
        .collect()
}
