//! `canopy tree`: render the visible hierarchy of a result set.

use super::{CommandContext, OutputOptions, print_json};
use crate::cli::TreeArgs;
use crate::config::CliOverrides;
use crate::error::{OptionExt, Result, find_similar_keys};
use crate::format::{RowMarks, TextFormatOptions, TreeOutput, TreeRow, format_tree_row, terminal_width};
use crate::session::Session;
use crate::source::JsonDumpSource;
use crate::storage::KeyValueStore;
use crate::tree::{self, TreeNode};
use tracing::{debug, warn};

/// Execute the tree command.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the result file cannot be
/// read.
pub fn execute(args: &TreeArgs, output: OutputOptions, overrides: &CliOverrides) -> Result<()> {
    let overrides = with_sort_overrides(args, overrides);
    let ctx = CommandContext::load(&overrides)?;
    let query_id = args.query.resolve_query_id();

    let (mut tracker, persistent) = ctx.open_tracker_or_ephemeral();
    if args.no_track {
        tracker.set_enabled(false);
    }

    let mut session = Session::new(tracker, ctx.hierarchy_options());
    let source = JsonDumpSource::new(&args.query.file);
    session.load(&source, args.query.query_text(), &query_id)?;

    apply_view_ops(&mut session, args)?;
    if persistent {
        session.persist_expanded();
    }

    let rows: Vec<TreeRow> = session
        .visible_rows()
        .into_iter()
        .map(|node| TreeRow::from_node(node, row_marks(&session, node)))
        .collect();

    let report = TreeOutput {
        query_id,
        total_issues: session.report().total_issues,
        visible_rows: rows.len(),
        orphan_count: session.report().orphan_count(),
        rows,
        changes: session.detection().clone(),
    };

    if output.json {
        return print_json(&report);
    }

    let options = TextFormatOptions {
        use_color: output.use_color(),
        max_width: Some(terminal_width()),
    };
    for row in &report.rows {
        println!("{}", format_tree_row(row, options));
    }

    if !output.quiet {
        println!();
        println!(
            "{} of {} issues shown",
            report.visible_rows, report.total_issues
        );
        if report.changes.has_changes {
            println!(
                "{} changes since checkpoint (run `canopy changes --ack` to acknowledge)",
                report.changes.change_count()
            );
        }
    }
    Ok(())
}

fn with_sort_overrides(args: &TreeArgs, overrides: &CliOverrides) -> CliOverrides {
    let mut overrides = overrides.clone();
    if let Some(field) = &args.sort {
        overrides.sort_field = Some(field.clone());
    }
    if args.desc {
        overrides.sort_direction = Some("desc".to_string());
    }
    overrides
}

/// Apply expand/collapse flags. Bulk operations run first.
///
/// Unknown keys are skipped with a warning, except for `--reveal`, which
/// names an issue the caller expects to see.
fn apply_view_ops<S: KeyValueStore>(session: &mut Session<S>, args: &TreeArgs) -> Result<()> {
    for key in &args.reveal {
        tree::find(session.forest(), key).issue_not_found(key)?;
    }

    if args.expand_all {
        session.expand_all();
    }
    if args.collapse_all {
        session.collapse_all();
    }

    for key in &args.expand {
        if known(session, key) {
            session.set_expanded(key, true);
        }
    }
    for key in &args.collapse {
        if known(session, key) {
            session.set_expanded(key, false);
        }
    }
    for key in &args.toggle {
        if known(session, key) {
            session.toggle(key);
        }
    }
    for key in &args.reveal {
        session.expand_to(key);
    }
    Ok(())
}

fn known<S: KeyValueStore>(session: &Session<S>, key: &str) -> bool {
    if tree::find(session.forest(), key).is_some() {
        return true;
    }
    let existing: Vec<String> = tree::all_nodes(session.forest())
        .into_iter()
        .map(|node| node.key().to_string())
        .collect();
    let similar = find_similar_keys(key, &existing, 3);
    if similar.is_empty() {
        warn!(key, "Key not in result set; ignoring");
    } else {
        warn!(key, suggestions = %similar.join(", "), "Key not in result set; ignoring");
    }
    false
}

fn row_marks<S: KeyValueStore>(session: &Session<S>, node: &TreeNode) -> RowMarks {
    let detection = session.detection();
    let key = node.key();
    let marks = RowMarks {
        is_new: detection.new_issues.iter().any(|k| k == key),
        status_changed: detection.status_changes.iter().any(|c| c.key == key),
        is_recent: session.is_recent(&node.issue),
    };
    if marks != RowMarks::default() {
        debug!(key, ?marks, "Row highlighted");
    }
    marks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeTracker, TrackingSettings};
    use crate::cli::QueryArgs;
    use crate::error::CanopyError;
    use crate::hierarchy::HierarchyOptions;
    use crate::model::Issue;
    use crate::source::StaticSource;
    use crate::storage::MemoryStore;
    use std::path::PathBuf;

    fn args() -> TreeArgs {
        TreeArgs {
            query: QueryArgs {
                file: PathBuf::from("dump.json"),
                jql: None,
                query_id: None,
            },
            expand: Vec::new(),
            collapse: Vec::new(),
            toggle: Vec::new(),
            reveal: Vec::new(),
            expand_all: false,
            collapse_all: false,
            sort: None,
            desc: false,
            no_track: false,
        }
    }

    fn loaded_session() -> Session<MemoryStore> {
        let mut session = Session::new(
            ChangeTracker::load(MemoryStore::new(), TrackingSettings::default()),
            HierarchyOptions::default(),
        );
        let issues = vec![
            Issue::new("P-1").with_type("Epic", false),
            Issue::new("P-2").with_parent("P-1"),
            Issue::new("P-3").with_parent("P-2"),
        ];
        session.load(&StaticSource::new(issues), "", "q").unwrap();
        session
    }

    #[test]
    fn test_reveal_expands_ancestors() {
        let mut session = loaded_session();
        let mut args = args();
        args.reveal = vec!["P-3".to_string()];
        apply_view_ops(&mut session, &args).unwrap();
        assert_eq!(session.visible_rows().len(), 3);
    }

    #[test]
    fn test_bulk_ops_run_before_single_keys() {
        let mut session = loaded_session();
        let mut args = args();
        args.expand_all = true;
        args.collapse = vec!["P-2".to_string()];
        apply_view_ops(&mut session, &args).unwrap();

        let keys: Vec<&str> = session.visible_rows().iter().map(|n| n.key()).collect();
        assert_eq!(keys, vec!["P-1", "P-2"]);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let mut session = loaded_session();
        let mut args = args();
        args.toggle = vec!["NOPE-1".to_string()];
        apply_view_ops(&mut session, &args).unwrap();
        assert_eq!(session.visible_rows().len(), 1);
    }

    #[test]
    fn test_reveal_unknown_key_fails() {
        let mut session = loaded_session();
        let mut args = args();
        args.reveal = vec!["P-9".to_string()];
        let err = apply_view_ops(&mut session, &args).unwrap_err();
        assert!(matches!(err, CanopyError::IssueNotFound { key } if key == "P-9"));
    }

    #[test]
    fn test_sort_flags_become_overrides() {
        let mut args = args();
        args.sort = Some("key".to_string());
        args.desc = true;
        let overrides = with_sort_overrides(&args, &CliOverrides::default());
        assert_eq!(overrides.sort_field.as_deref(), Some("key"));
        assert_eq!(overrides.sort_direction.as_deref(), Some("desc"));
    }
}
