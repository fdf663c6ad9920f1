//! Core data types for `canopy`.
//!
//! This module defines the issue record as the tracker's REST API returns it:
//! - `Issue` - key plus a `fields` bag
//! - `IssueStatus` / `StatusCategory` - workflow status and its category
//! - `IssueTypeRef` - issue type with the subtask flag
//! - `IssueLink` - typed, directional relationship to another issue
//!
//! Every field inside `fields` is optional and parsed leniently: a field that
//! is missing, `null`, or shaped differently than expected reads as "no
//! signal" instead of failing the whole record.

use crate::util::time::parse_tracker_timestamp;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Status name used when an issue carries no status.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// Issue type name used when an issue carries no type.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// A single tracker issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub fields: IssueFields,
}

/// The `fields` bag of an issue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub issuetype: Option<IssueTypeRef>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub parent: Option<IssueRef>,
    #[serde(default, deserialize_with = "lenient_vec", skip_serializing_if = "Vec::is_empty")]
    pub issuelinks: Vec<IssueLink>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserRef>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityRef>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentSummary>,
    /// Everything else, including custom fields such as the epic link.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Workflow status.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status_category: Option<StatusCategoryRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCategoryRef {
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Status category as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    New,
    Indeterminate,
    Done,
    #[default]
    Undefined,
    #[serde(untagged)]
    Custom(String),
}

impl StatusCategory {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "new",
            Self::Indeterminate => "indeterminate",
            Self::Done => "done",
            Self::Undefined => "undefined",
            Self::Custom(value) => value,
        }
    }

    /// Workflow position used when sorting by status.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::New => 0,
            Self::Indeterminate => 1,
            Self::Done => 2,
            Self::Undefined | Self::Custom(_) => 3,
        }
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatusCategory {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "new" | "to do" | "todo" => Self::New,
            "indeterminate" | "in progress" => Self::Indeterminate,
            "done" => Self::Done,
            "" | "undefined" => Self::Undefined,
            other => Self::Custom(other.to_string()),
        })
    }
}

/// Issue type reference.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueTypeRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subtask: bool,
    #[serde(
        default,
        rename = "hierarchyLevel",
        skip_serializing_if = "Option::is_none"
    )]
    pub hierarchy_level: Option<i32>,
}

/// Reference to another issue by key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueRef {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriorityRef {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommentSummary {
    #[serde(default)]
    pub total: u32,
}

/// A typed relationship between two issues.
///
/// Exactly one of `inward_issue` / `outward_issue` is normally present; the
/// label that applies from this issue's point of view is `link_type.inward`
/// for the former and `link_type.outward` for the latter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub link_type: Option<IssueLinkType>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub inward_issue: Option<IssueRef>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub outward_issue: Option<IssueRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueLinkType {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inward: String,
    #[serde(default)]
    pub outward: String,
}

/// Which side of a link the other issue sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Inward,
    Outward,
}

impl IssueLink {
    /// Link whose other issue is on the inward side, labelled `label` from
    /// this issue's point of view.
    #[must_use]
    pub fn inward(type_name: &str, label: &str, key: impl Into<String>) -> Self {
        Self {
            id: None,
            link_type: Some(IssueLinkType {
                name: type_name.to_string(),
                inward: label.to_string(),
                outward: String::new(),
            }),
            inward_issue: Some(IssueRef { key: key.into() }),
            outward_issue: None,
        }
    }

    /// Link whose other issue is on the outward side.
    #[must_use]
    pub fn outward(type_name: &str, label: &str, key: impl Into<String>) -> Self {
        Self {
            id: None,
            link_type: Some(IssueLinkType {
                name: type_name.to_string(),
                inward: String::new(),
                outward: label.to_string(),
            }),
            inward_issue: None,
            outward_issue: Some(IssueRef { key: key.into() }),
        }
    }

    /// The link's direction, the label that applies from this issue's point
    /// of view, and the linked issue's key.
    #[must_use]
    pub fn resolve(&self) -> Option<(LinkDirection, &str, &str)> {
        let link_type = self.link_type.as_ref();
        if let Some(inward) = &self.inward_issue {
            let label = link_type.map_or("", |t| t.inward.as_str());
            return Some((LinkDirection::Inward, label, inward.key.as_str()));
        }
        if let Some(outward) = &self.outward_issue {
            let label = link_type.map_or("", |t| t.outward.as_str());
            return Some((LinkDirection::Outward, label, outward.key.as_str()));
        }
        None
    }
}

impl Issue {
    /// Create an issue with only a key; all fields empty.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id: None,
            fields: IssueFields::default(),
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.fields.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, name: impl Into<String>, category: &str) -> Self {
        self.fields.status = Some(IssueStatus {
            name: name.into(),
            status_category: Some(StatusCategoryRef {
                key: category.to_string(),
                name: None,
            }),
        });
        self
    }

    #[must_use]
    pub fn with_type(mut self, name: impl Into<String>, subtask: bool) -> Self {
        self.fields.issuetype = Some(IssueTypeRef {
            name: name.into(),
            subtask,
            hierarchy_level: None,
        });
        self
    }

    #[must_use]
    pub fn with_parent(mut self, key: impl Into<String>) -> Self {
        self.fields.parent = Some(IssueRef { key: key.into() });
        self
    }

    #[must_use]
    pub fn with_custom_field(mut self, field_id: impl Into<String>, value: Value) -> Self {
        self.fields.extra.insert(field_id.into(), value);
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: IssueLink) -> Self {
        self.fields.issuelinks.push(link);
        self
    }

    #[must_use]
    pub fn with_updated(mut self, updated: DateTime<Utc>) -> Self {
        self.fields.updated = Some(updated);
        self
    }

    #[must_use]
    pub fn with_assignee(mut self, display_name: impl Into<String>) -> Self {
        self.fields.assignee = Some(UserRef {
            display_name: Some(display_name.into()),
            name: None,
        });
        self
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        self.fields.summary.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn status_name(&self) -> &str {
        self.fields
            .status
            .as_ref()
            .map(|s| s.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_STATUS)
    }

    #[must_use]
    pub fn status_category(&self) -> StatusCategory {
        self.fields
            .status
            .as_ref()
            .and_then(|s| s.status_category.as_ref())
            .map(|c| c.key.parse().unwrap_or_default())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn issue_type_name(&self) -> &str {
        self.fields
            .issuetype
            .as_ref()
            .map(|t| t.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_TYPE)
    }

    #[must_use]
    pub fn is_subtask(&self) -> bool {
        self.fields.issuetype.as_ref().is_some_and(|t| t.subtask)
    }

    #[must_use]
    pub fn parent_key(&self) -> Option<&str> {
        self.fields
            .parent
            .as_ref()
            .map(|p| p.key.as_str())
            .filter(|key| !key.is_empty())
    }

    /// String value of a custom field, if the field holds a non-empty string.
    #[must_use]
    pub fn custom_field_str(&self, field_id: &str) -> Option<&str> {
        self.fields
            .extra
            .get(field_id)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn assignee_name(&self) -> Option<&str> {
        self.fields
            .assignee
            .as_ref()
            .and_then(|a| a.display_name.as_deref().or(a.name.as_deref()))
    }

    #[must_use]
    pub fn priority_name(&self) -> Option<&str> {
        self.fields
            .priority
            .as_ref()
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
    }

    #[must_use]
    pub fn comment_count(&self) -> u32 {
        self.fields.comment.as_ref().map_or(0, |c| c.total)
    }
}

/// Deserialize an optional value, treating any shape mismatch as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

/// Deserialize a list, dropping elements that do not parse.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_tracker_timestamp))
}
