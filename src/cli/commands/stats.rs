use super::{CommandContext, OutputOptions, print_json};
use crate::cli::QueryArgs;
use crate::config::CliOverrides;
use crate::error::Result;
use crate::format::StatsReport;
use crate::hierarchy::build_hierarchy_with_report;
use crate::source::{IssueSource, JsonDumpSource};
use crate::tree::compute_stats;
use colored::Colorize;

/// Execute the stats command.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the result file cannot be
/// read.
pub fn execute(args: &QueryArgs, output: OutputOptions, overrides: &CliOverrides) -> Result<()> {
    let ctx = CommandContext::load(overrides)?;
    let issues = JsonDumpSource::new(&args.file).fetch_all(args.query_text())?;

    let mut options = ctx.hierarchy_options();
    options.expanded_keys.clear();
    let hierarchy = build_hierarchy_with_report(&issues, &options);
    let report = StatsReport::new(compute_stats(&hierarchy.roots), hierarchy.report);

    if output.json {
        return print_json(&report);
    }

    for line in render(&report, output.use_color()) {
        println!("{line}");
    }
    Ok(())
}

fn render(report: &StatsReport, use_color: bool) -> Vec<String> {
    let heading = |text: &str| {
        if use_color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    };

    let stats = &report.stats;
    let mut lines = vec![
        format!("Issues:    {}", stats.total_issues),
        format!("Roots:     {}", stats.root_count),
        format!("Max depth: {}", stats.max_depth),
    ];

    if !stats.counts_by_type.is_empty() {
        lines.push(String::new());
        lines.push(heading("By type:"));
        lines.extend(
            stats
                .counts_by_type
                .iter()
                .map(|(name, count)| format!("  {name:<16} {count}")),
        );
    }
    if !stats.counts_by_status.is_empty() {
        lines.push(String::new());
        lines.push(heading("By status:"));
        lines.extend(
            stats
                .counts_by_status
                .iter()
                .map(|(name, count)| format!("  {name:<16} {count}")),
        );
    }

    if !report.orphans.is_empty() {
        lines.push(String::new());
        lines.push(heading(&format!("Orphans ({}):", report.orphans.len())));
        lines.extend(
            report
                .orphans
                .iter()
                .map(|orphan| format!("  {} -> {} (not in results)", orphan.key, orphan.missing_parent)),
        );
    }
    if !report.cycle_breaks.is_empty() {
        lines.push(String::new());
        lines.push(heading("Cycles broken:"));
        lines.extend(
            report
                .cycle_breaks
                .iter()
                .map(|cycle| format!("  {} -/-> {}", cycle.key, cycle.parent)),
        );
    }
    if !report.duplicate_keys.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "{} {}",
            heading("Duplicate keys:"),
            report.duplicate_keys.join(", ")
        ));
    }
    lines
}
