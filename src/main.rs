use canopy::cli::commands::{self, OutputOptions};
use canopy::cli::{Cli, Commands};
use canopy::config::{self, CANOPY_DIR_NAME};
use canopy::logging::init_logging;
use canopy::{CanopyError, StructuredError};
use clap::Parser;
use std::io::{self, IsTerminal};
use std::path::Path;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }
    if cli.no_color {
        colored::control::set_override(false);
    }

    let overrides = build_cli_overrides(&cli);
    let output = OutputOptions {
        json: cli.json,
        quiet: cli.quiet,
        no_color: cli.no_color,
    };

    let result = match &cli.command {
        Commands::Init { force } => {
            let state_dir = cli
                .state_dir
                .clone()
                .unwrap_or_else(|| Path::new(".").join(CANOPY_DIR_NAME));
            commands::init::execute(*force, &state_dir, output)
        }
        Commands::Tree(args) => commands::tree::execute(args, output, &overrides),
        Commands::Stats(args) => commands::stats::execute(args, output, &overrides),
        Commands::Changes(args) => commands::changes::execute(args, output, &overrides),
        Commands::Checkpoint { command } => {
            commands::checkpoint::execute(command, output, &overrides)
        }
        Commands::Recent(args) => commands::recent::execute(args, output, &overrides),
        Commands::Config => commands::config::execute(output, &overrides),
        Commands::Completions(args) => commands::completions::execute(args),
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &CanopyError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    config::CliOverrides {
        epic_link_field: cli.epic_link_field.clone(),
        state_dir: cli.state_dir.clone(),
        ..config::CliOverrides::default()
    }
}
