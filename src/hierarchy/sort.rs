//! Sibling ordering.

use crate::error::CanopyError;
use crate::model::Issue;
use crate::util::compare_keys;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Field siblings are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Type rank (initiative, epic, standard, subtask), then key.
    #[default]
    Hierarchy,
    Key,
    Summary,
    Status,
    Priority,
    Updated,
    Created,
    Assignee,
}

impl SortField {
    pub const ALL: [Self; 8] = [
        Self::Hierarchy,
        Self::Key,
        Self::Summary,
        Self::Status,
        Self::Priority,
        Self::Updated,
        Self::Created,
        Self::Assignee,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hierarchy => "hierarchy",
            Self::Key => "key",
            Self::Summary => "summary",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Updated => "updated",
            Self::Created => "created",
            Self::Assignee => "assignee",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortField {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| CanopyError::InvalidSortField {
                field: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(CanopyError::validation(
                "sort.direction",
                format!("expected 'asc' or 'desc', got '{s}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Type rank: 0 initiative/theme, 1 epic, 2 standard, 3 subtask.
///
/// The subtask flag wins, then the tracker's numeric hierarchy level, then
/// the type name.
#[must_use]
pub fn hierarchy_rank(issue: &Issue) -> u8 {
    if issue.is_subtask() {
        return 3;
    }

    if let Some(level) = issue
        .fields
        .issuetype
        .as_ref()
        .and_then(|t| t.hierarchy_level)
    {
        return match level {
            i32::MIN..=-1 => 3,
            0 => 2,
            1 => 1,
            _ => 0,
        };
    }

    match issue.issue_type_name().to_lowercase().as_str() {
        "initiative" | "theme" => 0,
        "epic" => 1,
        "sub-task" | "subtask" => 3,
        _ => 2,
    }
}

/// Rank of the stock priority names; unknown names sort last.
fn priority_rank(issue: &Issue) -> u8 {
    match issue.priority_name().map(str::to_lowercase).as_deref() {
        Some("highest" | "blocker") => 0,
        Some("high" | "critical") => 1,
        Some("medium" | "major") => 2,
        Some("low" | "minor") => 3,
        Some("lowest" | "trivial") => 4,
        Some(_) => 5,
        None => 6,
    }
}

/// Compare two siblings under `config`.
///
/// The direction applies to the primary field only; ties always fall back to
/// natural key order, ascending, so the result is total and deterministic.
#[must_use]
pub fn compare_issues(a: &Issue, b: &Issue, config: &SortConfig) -> Ordering {
    let primary = match config.field {
        SortField::Hierarchy => hierarchy_rank(a).cmp(&hierarchy_rank(b)),
        SortField::Key => compare_keys(&a.key, &b.key),
        SortField::Summary => a.summary().to_lowercase().cmp(&b.summary().to_lowercase()),
        SortField::Status => a
            .status_category()
            .rank()
            .cmp(&b.status_category().rank())
            .then_with(|| a.status_name().cmp(b.status_name())),
        SortField::Priority => priority_rank(a).cmp(&priority_rank(b)),
        SortField::Updated => a.fields.updated.cmp(&b.fields.updated),
        SortField::Created => a.fields.created.cmp(&b.fields.created),
        SortField::Assignee => a
            .assignee_name()
            .map(str::to_lowercase)
            .cmp(&b.assignee_name().map(str::to_lowercase)),
    };

    config
        .direction
        .apply(primary)
        .then_with(|| compare_keys(&a.key, &b.key))
}
