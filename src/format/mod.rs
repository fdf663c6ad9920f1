//! Output formatting for `canopy`.
//!
//! Supports human-readable text output and machine-parseable JSON.
//!
//! # Output Types
//!
//! - [`TreeRow`] - one visible row of the tree (tree)
//! - [`TreeOutput`] - visible rows plus change summary (tree)
//! - [`ChangeReport`] - change detection result (changes)
//! - [`StatsReport`] - aggregate stats plus build diagnostics (stats)
//! - [`CheckpointSummary`] - saved checkpoints (checkpoint status)

mod output;
mod text;

pub use output::{
    ChangeReport, CheckpointSummary, RecentIssue, RowMarks, StatsReport, TreeOutput, TreeRow,
};
pub use text::{
    TextFormatOptions, expansion_marker, format_badges, format_change_lines, format_status_label,
    format_tree_row, format_type_badge, markers, terminal_width, truncate_to_width,
};
