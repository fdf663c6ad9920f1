//! CLI definitions and entry point.

use crate::util::query_id;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// Issue hierarchy browser with change tracking for saved tracker queries
#[derive(Parser, Debug)]
#[command(name = "canopy", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Custom field holding the epic key (e.g. `customfield_10014`)
    #[arg(long, global = true)]
    pub epic_link_field: Option<String>,

    /// State directory (auto-discover .canopy if not set)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Append JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a canopy state directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Show the issue hierarchy of a query result
    Tree(TreeArgs),

    /// Show hierarchy statistics
    Stats(QueryArgs),

    /// Show changes since the last checkpoint
    Changes(ChangesArgs),

    /// Manage checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },

    /// List recently updated issues
    Recent(RecentArgs),

    /// Show the merged configuration
    Config,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Query result input shared by most commands.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Saved search response (JSON) holding the query results
    pub file: PathBuf,

    /// Query text the results came from; hashed into the query id
    #[arg(long)]
    pub jql: Option<String>,

    /// Explicit query id for checkpoints
    #[arg(long)]
    pub query_id: Option<String>,
}

impl QueryArgs {
    /// `--query-id`, else a hash of `--jql`, else the file stem.
    #[must_use]
    pub fn resolve_query_id(&self) -> String {
        if let Some(id) = self.query_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        if let Some(jql) = self.jql.as_deref().filter(|jql| !jql.trim().is_empty()) {
            return query_id(jql);
        }
        self.file
            .file_stem()
            .map_or_else(|| "default".to_string(), |stem| stem.to_string_lossy().to_string())
    }

    /// Query text passed to the issue source.
    #[must_use]
    pub fn query_text(&self) -> &str {
        self.jql.as_deref().unwrap_or("")
    }
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Expand these keys
    #[arg(long, short = 'e')]
    pub expand: Vec<String>,

    /// Collapse these keys
    #[arg(long)]
    pub collapse: Vec<String>,

    /// Flip expansion of these keys
    #[arg(long)]
    pub toggle: Vec<String>,

    /// Expand the ancestors of these keys so they are visible
    #[arg(long)]
    pub reveal: Vec<String>,

    /// Expand every node
    #[arg(long, conflicts_with = "collapse_all")]
    pub expand_all: bool,

    /// Collapse every node
    #[arg(long)]
    pub collapse_all: bool,

    /// Sort siblings by field (hierarchy, key, summary, status, priority, updated, created, assignee)
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort in descending order
    #[arg(long)]
    pub desc: bool,

    /// Do not run change detection
    #[arg(long)]
    pub no_track: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ChangesArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Save a new checkpoint after reporting
    #[arg(long)]
    pub ack: bool,
}

#[derive(Subcommand, Debug)]
pub enum CheckpointCommands {
    /// Save the current results as the checkpoint
    Save(QueryArgs),

    /// Remove saved checkpoints
    Clear(CheckpointClearArgs),

    /// List saved checkpoints
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct CheckpointClearArgs {
    /// Query id to clear
    #[arg(long, required_unless_present = "all")]
    pub query_id: Option<String>,

    /// Clear every checkpoint
    #[arg(long, conflicts_with = "query_id")]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RecentArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Activity window (24h, 7d, off)
    #[arg(long)]
    pub period: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: ShellType,

    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Supported shells for completion generation.
#[derive(ValueEnum, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ShellType {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    #[value(name = "powershell")]
    #[value(alias = "pwsh")]
    /// `PowerShell`
    PowerShell,
    /// Elvish
    Elvish,
}
