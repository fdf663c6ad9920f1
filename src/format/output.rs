use crate::changes::{ChangeDetection, QueryCheckpoint};
use crate::hierarchy::{BuildReport, CycleBreak, OrphanRecord};
use crate::model::StatusCategory;
use crate::tree::{TreeNode, TreeStats};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Row highlights derived from change tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowMarks {
    pub is_new: bool,
    pub status_changed: bool,
    pub is_recent: bool,
}

/// One visible row of the tree view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeRow {
    pub key: String,
    pub summary: String,
    pub issue_type: String,
    pub status: String,
    pub status_category: StatusCategory,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_key: Option<String>,
    pub child_count: usize,
    pub is_expanded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub marks: RowMarks,
}

impl TreeRow {
    #[must_use]
    pub fn from_node(node: &TreeNode, marks: RowMarks) -> Self {
        let issue = &node.issue;
        Self {
            key: issue.key.clone(),
            summary: issue.summary().to_string(),
            issue_type: issue.issue_type_name().to_string(),
            status: issue.status_name().to_string(),
            status_category: issue.status_category(),
            depth: node.depth,
            parent_key: node.parent_key.clone(),
            child_count: node.children.len(),
            is_expanded: node.is_expanded,
            assignee: issue.assignee_name().map(str::to_string),
            updated: issue.fields.updated,
            marks,
        }
    }
}

/// `canopy tree` output.
#[derive(Debug, Clone, Serialize)]
pub struct TreeOutput {
    pub query_id: String,
    pub total_issues: usize,
    pub visible_rows: usize,
    pub orphan_count: usize,
    pub rows: Vec<TreeRow>,
    pub changes: ChangeDetection,
}

/// `canopy changes` output.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    pub query_id: String,
    pub baseline_created: bool,
    pub pending: bool,
    pub acknowledged: bool,
    #[serde(flatten)]
    pub detection: ChangeDetection,
}

/// `canopy stats` output.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub stats: TreeStats,
    pub orphans: Vec<OrphanRecord>,
    pub cycle_breaks: Vec<CycleBreak>,
    pub duplicate_keys: Vec<String>,
}

impl StatsReport {
    #[must_use]
    pub fn new(stats: TreeStats, report: BuildReport) -> Self {
        Self {
            stats,
            orphans: report.orphans,
            cycle_breaks: report.cycle_breaks,
            duplicate_keys: report.duplicate_keys,
        }
    }
}

/// One entry of `canopy checkpoint status`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointSummary {
    pub query_id: String,
    pub timestamp: DateTime<Utc>,
    pub issue_count: usize,
    pub age_seconds: i64,
    pub pending: bool,
}

impl CheckpointSummary {
    #[must_use]
    pub fn new(query_id: &str, checkpoint: &QueryCheckpoint, now: DateTime<Utc>, pending: bool) -> Self {
        Self {
            query_id: query_id.to_string(),
            timestamp: checkpoint.timestamp,
            issue_count: checkpoint.issues.len(),
            age_seconds: now.signed_duration_since(checkpoint.timestamp).num_seconds(),
            pending,
        }
    }
}

/// One entry of `canopy recent`.
#[derive(Debug, Clone, Serialize)]
pub struct RecentIssue {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub updated: DateTime<Utc>,
}
