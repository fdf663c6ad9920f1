//! Shell completions generation command.
//!
//! ```bash
//! canopy completions bash > ~/.local/share/bash-completion/completions/canopy
//! canopy completions zsh -o ~/.zsh/completions/_canopy
//! ```

use crate::cli::{Cli, CompletionsArgs, ShellType};
use crate::error::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;
use tracing::info;

const BIN_NAME: &str = "canopy";

/// Execute the completions command.
///
/// # Errors
///
/// Returns an error if file I/O fails.
pub fn execute(args: &CompletionsArgs) -> Result<()> {
    info!(shell = ?args.shell, output = ?args.output, "Generating shell completions");

    let mut cmd = Cli::command();
    let shell = convert_shell_type(args.shell);

    if let Some(output_path) = &args.output {
        let mut file = std::fs::File::create(output_path)?;
        generate(shell, &mut cmd, BIN_NAME, &mut file);
        eprintln!(
            "Generated {} completions to {}",
            shell_name(args.shell),
            output_path.display()
        );
    } else {
        generate(shell, &mut cmd, BIN_NAME, &mut io::stdout());
    }

    Ok(())
}

const fn convert_shell_type(shell: ShellType) -> Shell {
    match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
        ShellType::PowerShell => Shell::PowerShell,
        ShellType::Elvish => Shell::Elvish,
    }
}

const fn shell_name(shell: ShellType) -> &'static str {
    match shell {
        ShellType::Bash => "bash",
        ShellType::Zsh => "zsh",
        ShellType::Fish => "fish",
        ShellType::PowerShell => "PowerShell",
        ShellType::Elvish => "elvish",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: Shell) -> String {
        let mut cmd = Cli::command();
        let mut output = Vec::new();
        generate(shell, &mut cmd, BIN_NAME, &mut output);
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_convert_shell_type() {
        assert_eq!(convert_shell_type(ShellType::Bash), Shell::Bash);
        assert_eq!(convert_shell_type(ShellType::PowerShell), Shell::PowerShell);
        assert_eq!(convert_shell_type(ShellType::Elvish), Shell::Elvish);
    }

    #[test]
    fn test_bash_completion_lists_commands() {
        let script = script(Shell::Bash);
        assert!(script.contains("_canopy"));
        for command in ["tree", "stats", "changes", "checkpoint", "recent"] {
            assert!(script.contains(command), "missing {command}");
        }
        assert!(script.contains("--json"));
        assert!(script.contains("--epic-link-field"));
    }

    #[test]
    fn test_fish_completion_syntax() {
        assert!(script(Shell::Fish).contains("complete -c canopy"));
    }
}
