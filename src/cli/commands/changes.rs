//! `canopy changes`: compare a result set with its checkpoint.

use super::{CommandContext, OutputOptions, print_json};
use crate::changes::ChangeTracker;
use crate::cli::ChangesArgs;
use crate::config::CliOverrides;
use crate::error::Result;
use crate::format::{ChangeReport, format_change_lines};
use crate::model::Issue;
use crate::source::{IssueSource, JsonDumpSource};
use crate::storage::KeyValueStore;
use crate::util::format_age;
use chrono::Utc;
use tracing::info;

/// Execute the changes command.
///
/// # Errors
///
/// Returns `NotInitialized` without a state directory, or an error if the
/// result file cannot be read.
pub fn execute(args: &ChangesArgs, output: OutputOptions, overrides: &CliOverrides) -> Result<()> {
    let ctx = CommandContext::load(overrides)?;
    let mut tracker = ctx.open_tracker()?;
    let query_id = args.query.resolve_query_id();
    let issues = JsonDumpSource::new(&args.query.file).fetch_all(args.query.query_text())?;

    let report = run(&mut tracker, &query_id, &issues, args.ack);

    if output.json {
        return print_json(&report);
    }
    if output.quiet {
        return Ok(());
    }

    if !tracker.settings().enabled {
        println!("Change tracking is disabled (tracking.enabled = false)");
        return Ok(());
    }
    if report.baseline_created {
        println!(
            "No checkpoint for '{query_id}'; saved {} issues as the baseline",
            issues.len()
        );
        return Ok(());
    }

    let since = report
        .detection
        .checkpoint_timestamp
        .map(|ts| format!(" (checkpoint {})", format_age(Utc::now() - ts)))
        .unwrap_or_default();
    if report.detection.has_changes {
        println!("{} changes since checkpoint{since}", report.detection.change_count());
        for line in format_change_lines(&report.detection, output.use_color()) {
            println!("  {line}");
        }
    } else {
        println!("No changes since checkpoint{since}");
    }
    if report.acknowledged {
        println!("Checkpoint updated");
    }
    Ok(())
}

/// Detect changes and optionally acknowledge them.
fn run<S: KeyValueStore>(
    tracker: &mut ChangeTracker<S>,
    query_id: &str,
    issues: &[Issue],
    acknowledge: bool,
) -> ChangeReport {
    let enabled = tracker.settings().enabled;
    let baseline_created = enabled && !tracker.has_checkpoint(query_id);
    let mut detection = tracker.detect_changes(query_id, issues);
    if detection.checkpoint_timestamp.is_none() {
        detection.checkpoint_timestamp = tracker.checkpoint(query_id).map(|cp| cp.timestamp);
    }

    let acknowledged = acknowledge && enabled && !baseline_created;
    if acknowledged {
        tracker.save_checkpoint(query_id, issues);
        info!(query_id, changes = detection.change_count(), "Acknowledged changes");
    }

    ChangeReport {
        query_id: query_id.to_string(),
        baseline_created,
        pending: tracker.has_pending_changes(query_id),
        acknowledged,
        detection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::TrackingSettings;
    use crate::storage::MemoryStore;

    fn tracker() -> ChangeTracker<MemoryStore> {
        ChangeTracker::load(MemoryStore::new(), TrackingSettings::default())
    }

    fn issue(key: &str, status: &str) -> Issue {
        Issue::new(key).with_status(status, "new")
    }

    #[test]
    fn test_first_run_creates_baseline() {
        let mut tracker = tracker();
        let report = run(&mut tracker, "q", &[issue("A", "Open")], false);
        assert!(report.baseline_created);
        assert!(!report.detection.has_changes);
        assert!(!report.pending);
        assert!(tracker.has_checkpoint("q"));
    }

    #[test]
    fn test_changes_stay_pending_until_ack() {
        let mut tracker = tracker();
        run(&mut tracker, "q", &[issue("A", "Open")], false);

        let next = [issue("A", "Open"), issue("B", "Open")];
        let report = run(&mut tracker, "q", &next, false);
        assert_eq!(report.detection.new_issues, vec!["B".to_string()]);
        assert!(report.pending);
        assert!(!report.acknowledged);

        let report = run(&mut tracker, "q", &next, true);
        assert!(report.acknowledged);
        assert!(!report.pending);

        let report = run(&mut tracker, "q", &next, false);
        assert!(!report.detection.has_changes);
    }

    #[test]
    fn test_disabled_tracking_reports_nothing() {
        let mut tracker = tracker();
        tracker.set_enabled(false);
        let report = run(&mut tracker, "q", &[issue("A", "Open")], true);
        assert!(!report.baseline_created);
        assert!(!report.acknowledged);
        assert!(!tracker.has_checkpoint("q"));
    }
}
