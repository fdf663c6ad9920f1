//! Context helpers for attaching messages to errors.

use super::{CanopyError, Result};

/// Extension trait to attach context to fallible results.
pub trait ResultExt<T> {
    /// Wrap the error with a static context message.
    ///
    /// # Errors
    ///
    /// Returns `CanopyError::WithContext` when `self` is an error.
    fn context(self, context: &str) -> Result<T>;

    /// Wrap the error with a lazily built context message.
    ///
    /// # Errors
    ///
    /// Returns `CanopyError::WithContext` when `self` is an error.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|source| CanopyError::WithContext {
            context: context.to_string(),
            source: Box::new(source),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| CanopyError::WithContext {
            context: f(),
            source: Box::new(source),
        })
    }
}

/// Extension trait to turn a missing value into an error.
pub trait OptionExt<T> {
    /// Convert `None` into `CanopyError::IssueNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `CanopyError::IssueNotFound` when `self` is `None`.
    fn issue_not_found(self, key: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn issue_not_found(self, key: &str) -> Result<T> {
        self.ok_or_else(|| CanopyError::IssueNotFound {
            key: key.to_string(),
        })
    }
}
