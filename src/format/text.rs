//! Text formatting for terminal output.
//!
//! - Expansion markers (▸ ▾ ·)
//! - Status labels colored by category
//! - Tree rows with change badges
//! - Change summaries

use super::output::TreeRow;
use crate::changes::ChangeDetection;
use crate::model::StatusCategory;
use colored::Colorize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Expansion marker characters.
pub mod markers {
    /// Node with hidden children.
    pub const COLLAPSED: &str = "▸";
    /// Node whose children are shown.
    pub const EXPANDED: &str = "▾";
    /// Node without children.
    pub const LEAF: &str = "·";
}

/// Formatting options for text output.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatOptions {
    pub use_color: bool,
    pub max_width: Option<usize>,
}

impl TextFormatOptions {
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            use_color: false,
            max_width: None,
        }
    }
}

#[must_use]
pub const fn expansion_marker(row: &TreeRow) -> &'static str {
    if row.child_count == 0 {
        markers::LEAF
    } else if row.is_expanded {
        markers::EXPANDED
    } else {
        markers::COLLAPSED
    }
}

/// Format status label with optional color.
#[must_use]
pub fn format_status_label(status: &str, category: &StatusCategory, use_color: bool) -> String {
    if !use_color {
        return status.to_string();
    }

    match category {
        StatusCategory::New => status.blue().to_string(),
        StatusCategory::Indeterminate => status.yellow().to_string(),
        StatusCategory::Done => status.green().to_string(),
        StatusCategory::Undefined | StatusCategory::Custom(_) => status.normal().to_string(),
    }
}

/// Format issue type as a bracketed badge.
#[must_use]
pub fn format_type_badge(issue_type: &str, use_color: bool) -> String {
    if !use_color {
        return format!("[{issue_type}]");
    }

    let colored = match issue_type.to_lowercase().as_str() {
        "epic" | "initiative" | "theme" => issue_type.magenta().bold().to_string(),
        "bug" => issue_type.red().to_string(),
        "sub-task" | "subtask" => issue_type.bright_black().to_string(),
        _ => issue_type.cyan().to_string(),
    };
    format!("[{colored}]")
}

/// Change badges for a row, space separated.
#[must_use]
pub fn format_badges(row: &TreeRow, use_color: bool) -> String {
    let mut badges = Vec::new();
    if row.marks.is_new {
        badges.push(if use_color {
            "new".green().bold().to_string()
        } else {
            "new".to_string()
        });
    }
    if row.marks.status_changed {
        badges.push(if use_color {
            "changed".yellow().bold().to_string()
        } else {
            "changed".to_string()
        });
    }
    if row.marks.is_recent {
        badges.push(if use_color {
            "recent".cyan().to_string()
        } else {
            "recent".to_string()
        });
    }
    badges
        .into_iter()
        .map(|badge| format!("<{badge}>"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Determine terminal width from environment (falls back to 80).
#[must_use]
pub fn terminal_width() -> usize {
    if let Ok(columns) = std::env::var("COLUMNS") {
        if let Ok(value) = columns.trim().parse::<usize>() {
            if value > 0 {
                return value;
            }
        }
    }
    80
}

/// Truncate text to fit within `max_len` visible columns.
///
/// Handles wide characters (emojis, CJK) correctly using `unicode-width`.
#[must_use]
pub fn truncate_to_width(text: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(text) <= max_len {
        return text.to_string();
    }

    let (budget, ellipsis) = if max_len <= 3 {
        (max_len, "")
    } else {
        (max_len - 3, "...")
    };

    let mut width = 0;
    let mut out = String::new();
    for c in text.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw > budget {
            break;
        }
        width += cw;
        out.push(c);
    }
    out.push_str(ellipsis);
    out
}

/// Format one tree row.
///
/// Format: `{indent}{marker} {key} [{type}] {status}  {summary} {badges}`
#[must_use]
pub fn format_tree_row(row: &TreeRow, options: TextFormatOptions) -> String {
    let indent = "  ".repeat(row.depth);
    let marker = expansion_marker(row);
    let plain_badges = format_badges(row, false);

    let prefix_len = UnicodeWidthStr::width(indent.as_str())
        + UnicodeWidthStr::width(marker)
        + 1
        + UnicodeWidthStr::width(row.key.as_str())
        + 1
        + UnicodeWidthStr::width(row.issue_type.as_str())
        + 3
        + UnicodeWidthStr::width(row.status.as_str())
        + 2;
    let suffix_len = if plain_badges.is_empty() {
        0
    } else {
        UnicodeWidthStr::width(plain_badges.as_str()) + 1
    };

    let summary = options.max_width.map_or_else(
        || row.summary.clone(),
        |width| truncate_to_width(&row.summary, width.saturating_sub(prefix_len + suffix_len)),
    );

    let key = if options.use_color {
        row.key.bold().to_string()
    } else {
        row.key.clone()
    };
    let type_badge = format_type_badge(&row.issue_type, options.use_color);
    let status = format_status_label(&row.status, &row.status_category, options.use_color);

    let mut line = format!("{indent}{marker} {key} {type_badge} {status}  {summary}");
    if suffix_len > 0 {
        line.push(' ');
        line.push_str(&format_badges(row, options.use_color));
    }
    line
}

/// Human-readable lines describing a change detection.
#[must_use]
pub fn format_change_lines(detection: &ChangeDetection, use_color: bool) -> Vec<String> {
    let paint = |symbol: &str, color: fn(&str) -> colored::ColoredString| {
        if use_color {
            color(symbol).to_string()
        } else {
            symbol.to_string()
        }
    };

    let mut lines = Vec::with_capacity(detection.change_count());
    for key in &detection.new_issues {
        lines.push(format!("{} {key}  new", paint("+", |s| s.green())));
    }
    for removed in &detection.removed_issues {
        let summary = removed
            .summary
            .as_deref()
            .map(|s| format!("  {s}"))
            .unwrap_or_default();
        lines.push(format!(
            "{} {}  removed (was {}){summary}",
            paint("-", |s| s.red()),
            removed.key,
            removed.last_status
        ));
    }
    for change in &detection.status_changes {
        lines.push(format!(
            "{} {}  {} -> {}",
            paint("~", |s| s.yellow()),
            change.key,
            change.previous_status,
            format_status_label(&change.current_status, &change.current_category, use_color)
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{RemovedIssue, StatusChange};
    use crate::format::RowMarks;

    fn row(key: &str, depth: usize, child_count: usize, expanded: bool) -> TreeRow {
        TreeRow {
            key: key.to_string(),
            summary: "Build the login form".to_string(),
            issue_type: "Story".to_string(),
            status: "Open".to_string(),
            status_category: StatusCategory::New,
            depth,
            parent_key: None,
            child_count,
            is_expanded: expanded,
            assignee: None,
            updated: None,
            marks: RowMarks::default(),
        }
    }

    #[test]
    fn test_markers() {
        assert_eq!(expansion_marker(&row("P-1", 0, 0, false)), markers::LEAF);
        assert_eq!(expansion_marker(&row("P-1", 0, 2, false)), markers::COLLAPSED);
        assert_eq!(expansion_marker(&row("P-1", 0, 2, true)), markers::EXPANDED);
    }

    #[test]
    fn test_format_tree_row_plain() {
        let line = format_tree_row(&row("P-2", 1, 0, false), TextFormatOptions::plain());
        assert_eq!(line, "  · P-2 [Story] Open  Build the login form");
    }

    #[test]
    fn test_format_tree_row_badges() {
        let mut r = row("P-3", 0, 1, true);
        r.marks.is_new = true;
        r.marks.is_recent = true;
        let line = format_tree_row(&r, TextFormatOptions::plain());
        assert!(line.ends_with("<new> <recent>"));
        assert!(line.starts_with("▾ P-3"));
    }

    #[test]
    fn test_format_tree_row_truncates_summary() {
        let options = TextFormatOptions {
            use_color: false,
            max_width: Some(30),
        };
        let line = format_tree_row(&row("P-4", 0, 0, false), options);
        assert!(line.ends_with("..."));
        assert!(UnicodeWidthStr::width(line.as_str()) <= 30);
    }

    #[test]
    fn test_truncate_wide_chars() {
        assert_eq!(truncate_to_width("日本語のタイトル", 7), "日本...");
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdef", 2), "ab");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn test_change_lines_plain() {
        let detection = ChangeDetection {
            new_issues: vec!["C".to_string()],
            removed_issues: vec![RemovedIssue {
                key: "B".to_string(),
                last_status: "Open".to_string(),
                summary: None,
            }],
            status_changes: vec![StatusChange {
                key: "A".to_string(),
                previous_status: "Open".to_string(),
                current_status: "Done".to_string(),
                previous_category: StatusCategory::New,
                current_category: StatusCategory::Done,
            }],
            has_changes: true,
            checkpoint_timestamp: None,
        };
        assert_eq!(
            format_change_lines(&detection, false),
            vec![
                "+ C  new".to_string(),
                "- B  removed (was Open)".to_string(),
                "~ A  Open -> Done".to_string(),
            ]
        );
    }
}
