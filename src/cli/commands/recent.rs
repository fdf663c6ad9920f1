use super::{CommandContext, OutputOptions, print_json};
use crate::changes::{ActivityPeriod, is_recently_updated_at};
use crate::cli::RecentArgs;
use crate::config::CliOverrides;
use crate::error::Result;
use crate::format::RecentIssue;
use crate::model::Issue;
use crate::source::{IssueSource, JsonDumpSource};
use crate::util::{compare_keys, format_age};
use chrono::{DateTime, Utc};
use colored::Colorize;

/// Execute the recent command.
///
/// # Errors
///
/// Returns an error if `--period` is invalid or the result file cannot be
/// read.
pub fn execute(args: &RecentArgs, output: OutputOptions, overrides: &CliOverrides) -> Result<()> {
    let mut overrides = overrides.clone();
    if let Some(period) = &args.period {
        overrides.activity_period = Some(period.clone());
    }
    let ctx = CommandContext::load(&overrides)?;
    let period = ctx.config.tracking.activity_period;
    let issues = JsonDumpSource::new(&args.query.file).fetch_all(args.query.query_text())?;

    let now = Utc::now();
    let recent = recent_issues(&issues, period, now);

    if output.json {
        return print_json(&recent);
    }

    if recent.is_empty() {
        if !output.quiet {
            match period {
                ActivityPeriod::Off => println!("Activity window is off"),
                _ => println!("No issues updated in the last {period}"),
            }
        }
        return Ok(());
    }
    let use_color = output.use_color();
    for issue in &recent {
        let key = if use_color {
            issue.key.bold().to_string()
        } else {
            issue.key.clone()
        };
        println!(
            "{key}  {:<12} {}  {}",
            format_age(now - issue.updated),
            issue.status,
            issue.summary
        );
    }
    Ok(())
}

/// Issues updated within `period`, most recent first.
fn recent_issues(issues: &[Issue], period: ActivityPeriod, now: DateTime<Utc>) -> Vec<RecentIssue> {
    let mut recent: Vec<RecentIssue> = issues
        .iter()
        .filter(|issue| is_recently_updated_at(issue, period, now))
        .filter_map(|issue| {
            issue.fields.updated.map(|updated| RecentIssue {
                key: issue.key.clone(),
                summary: issue.summary().to_string(),
                status: issue.status_name().to_string(),
                updated,
            })
        })
        .collect();
    recent.sort_by(|a, b| {
        b.updated
            .cmp(&a.updated)
            .then_with(|| compare_keys(&a.key, &b.key))
    });
    recent
}
