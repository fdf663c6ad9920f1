//! Where query results come from.
//!
//! Fetching and pagination belong to the collaborator behind
//! [`IssueSource`]; the core only sees the complete, flat result list.

use crate::error::{CanopyError, Result};
use crate::model::Issue;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Produces the full result set for a query.
pub trait IssueSource {
    /// Fetch every issue matching `query`, all pages concatenated.
    ///
    /// # Errors
    ///
    /// Returns an error if the results cannot be obtained or are not an
    /// issue collection.
    fn fetch_all(&self, query: &str) -> Result<Vec<Issue>>;
}

/// Reads search responses saved to disk.
///
/// Accepted layouts: a bare array of issues, a search response object with
/// an `issues` array, or an array of such response pages. The query string
/// is not evaluated; the file already holds its results.
#[derive(Debug, Clone)]
pub struct JsonDumpSource {
    path: PathBuf,
}

impl JsonDumpSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IssueSource for JsonDumpSource {
    fn fetch_all(&self, query: &str) -> Result<Vec<Issue>> {
        let contents = fs::read_to_string(&self.path)?;
        let value: Value =
            serde_json::from_str(&contents).map_err(|err| CanopyError::SourceFormat {
                path: self.path.clone(),
                reason: err.to_string(),
            })?;
        let issues = parse_issues(value, &self.path)?;
        debug!(
            path = %self.path.display(),
            query,
            count = issues.len(),
            "Loaded issues from dump"
        );
        Ok(issues)
    }
}

/// Fixed result set, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    issues: Vec<Issue>,
}

impl StaticSource {
    #[must_use]
    pub const fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }
}

impl IssueSource for StaticSource {
    fn fetch_all(&self, _query: &str) -> Result<Vec<Issue>> {
        Ok(self.issues.clone())
    }
}

/// Extract issues from one of the accepted JSON layouts.
///
/// Elements that are not issue objects (no string `key`) are skipped with a
/// warning.
///
/// # Errors
///
/// Returns `CanopyError::SourceFormat` when `value` matches none of the
/// layouts.
pub fn parse_issues(value: Value, origin: &Path) -> Result<Vec<Issue>> {
    let format_error = |reason: &str| CanopyError::SourceFormat {
        path: origin.to_path_buf(),
        reason: reason.to_string(),
    };

    let raw_issues: Vec<Value> = match value {
        Value::Object(mut page) => match page.remove("issues") {
            Some(Value::Array(items)) => items,
            _ => return Err(format_error("object has no 'issues' array")),
        },
        Value::Array(items) if items.iter().any(is_page) => {
            let mut all = Vec::new();
            for item in items {
                let Value::Object(mut page) = item else {
                    return Err(format_error("mixed pages and non-page values"));
                };
                match page.remove("issues") {
                    Some(Value::Array(page_items)) => all.extend(page_items),
                    _ => return Err(format_error("page has no 'issues' array")),
                }
            }
            all
        }
        Value::Array(items) => items,
        _ => return Err(format_error("expected an array or an object")),
    };

    let mut skipped = 0usize;
    let issues: Vec<Issue> = raw_issues
        .into_iter()
        .filter_map(|raw| {
            let parsed = raw
                .get("key")
                .and_then(Value::as_str)
                .is_some()
                .then(|| serde_json::from_value::<Issue>(raw).ok())
                .flatten();
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();

    if skipped > 0 {
        warn!(
            path = %origin.display(),
            skipped,
            "Skipped entries that are not issues"
        );
    }
    Ok(issues)
}

fn is_page(value: &Value) -> bool {
    value.get("issues").is_some_and(Value::is_array) && value.get("key").is_none()
}
