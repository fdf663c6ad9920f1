//! `canopy checkpoint save|clear|status`.

use super::{CommandContext, OutputOptions, print_json};
use crate::changes::ChangeTracker;
use crate::cli::{CheckpointClearArgs, CheckpointCommands, QueryArgs};
use crate::config::CliOverrides;
use crate::error::{CanopyError, Result};
use crate::format::CheckpointSummary;
use crate::source::{IssueSource, JsonDumpSource};
use crate::storage::KeyValueStore;
use crate::util::format_age;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SaveOutput {
    query_id: String,
    issue_count: usize,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct ClearOutput {
    cleared: usize,
}

/// Execute a checkpoint subcommand.
///
/// # Errors
///
/// Returns `NotInitialized` without a state directory.
pub fn execute(
    command: &CheckpointCommands,
    output: OutputOptions,
    overrides: &CliOverrides,
) -> Result<()> {
    let ctx = CommandContext::load(overrides)?;
    let mut tracker = ctx.open_tracker()?;

    match command {
        CheckpointCommands::Save(args) => save(&mut tracker, args, output),
        CheckpointCommands::Clear(args) => clear(&mut tracker, args, output),
        CheckpointCommands::Status => status(&tracker, output),
    }
}

fn save<S: KeyValueStore>(
    tracker: &mut ChangeTracker<S>,
    args: &QueryArgs,
    output: OutputOptions,
) -> Result<()> {
    if !tracker.settings().enabled {
        return Err(CanopyError::validation(
            "tracking.enabled",
            "change tracking is disabled; nothing was saved",
        ));
    }

    let query_id = args.resolve_query_id();
    let issues = JsonDumpSource::new(&args.file).fetch_all(args.query_text())?;
    tracker.save_checkpoint(&query_id, &issues);

    let saved = SaveOutput {
        timestamp: tracker.checkpoint(&query_id).map(|cp| cp.timestamp),
        issue_count: issues.len(),
        query_id,
    };
    if output.json {
        return print_json(&saved);
    }
    if !output.quiet {
        println!(
            "Saved checkpoint for '{}' ({} issues)",
            saved.query_id, saved.issue_count
        );
    }
    Ok(())
}

fn clear<S: KeyValueStore>(
    tracker: &mut ChangeTracker<S>,
    args: &CheckpointClearArgs,
    output: OutputOptions,
) -> Result<()> {
    let cleared = if args.all {
        tracker.clear_all()
    } else {
        let query_id = args.query_id.as_deref().unwrap_or_default();
        if !tracker.clear_checkpoint(query_id) {
            return Err(CanopyError::validation(
                "query-id",
                format!("no checkpoint saved for '{query_id}'"),
            ));
        }
        1
    };

    if output.json {
        return print_json(&ClearOutput { cleared });
    }
    if !output.quiet {
        println!("Cleared {cleared} checkpoint(s)");
    }
    Ok(())
}

fn status<S: KeyValueStore>(tracker: &ChangeTracker<S>, output: OutputOptions) -> Result<()> {
    let summaries = summarize(tracker, Utc::now());
    if output.json {
        return print_json(&summaries);
    }

    if summaries.is_empty() {
        if !output.quiet {
            println!("No checkpoints saved");
        }
        return Ok(());
    }
    for summary in &summaries {
        let pending = if summary.pending { "  [changes pending]" } else { "" };
        println!(
            "{}  {} issues  saved {}{pending}",
            summary.query_id,
            summary.issue_count,
            format_age(Duration::seconds(summary.age_seconds))
        );
    }
    Ok(())
}

fn summarize<S: KeyValueStore>(tracker: &ChangeTracker<S>, now: DateTime<Utc>) -> Vec<CheckpointSummary> {
    tracker
        .checkpoints()
        .map(|(query_id, checkpoint)| {
            CheckpointSummary::new(
                query_id,
                checkpoint,
                now,
                tracker.has_pending_changes(query_id),
            )
        })
        .collect()
}
