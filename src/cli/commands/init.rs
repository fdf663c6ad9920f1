use super::{OutputOptions, display_path, print_json};
use crate::config::CONFIG_TEMPLATE;
use crate::error::{CanopyError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const GITIGNORE: &str = r"# Tracker state
checkpoints.json
pending-changes.json
expanded-nodes.json

# Temporary
*.tmp
";

#[derive(Debug, Serialize)]
struct InitOutput {
    state_dir: PathBuf,
    config_written: bool,
}

/// Execute the init command.
///
/// `state_dir` is the directory to create, normally `./.canopy`.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if a config file exists and `force` is not
/// set, or an I/O error if the directory cannot be written.
pub fn execute(force: bool, state_dir: &Path, output: OutputOptions) -> Result<()> {
    let config_path = state_dir.join("config.yaml");
    if config_path.exists() && !force {
        return Err(CanopyError::AlreadyInitialized { path: config_path });
    }

    fs::create_dir_all(state_dir)?;
    fs::write(&config_path, CONFIG_TEMPLATE)?;

    let gitignore_path = state_dir.join(".gitignore");
    if !gitignore_path.exists() || force {
        fs::write(gitignore_path, GITIGNORE)?;
    }

    info!(path = %state_dir.display(), force, "Initialized state directory");

    if output.json {
        return print_json(&InitOutput {
            state_dir: state_dir.to_path_buf(),
            config_written: true,
        });
    }
    if !output.quiet {
        println!("Initialized canopy state in {}/", display_path(state_dir));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLayer;
    use tempfile::TempDir;

    fn quiet() -> OutputOptions {
        OutputOptions {
            quiet: true,
            ..OutputOptions::default()
        }
    }

    #[test]
    fn test_init_creates_state_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".canopy");
        execute(false, &dir, quiet()).unwrap();

        assert!(dir.join("config.yaml").exists());
        assert!(dir.join(".gitignore").exists());
    }

    #[test]
    fn test_template_parses_as_empty_layer() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".canopy");
        execute(false, &dir, quiet()).unwrap();

        let layer = ConfigLayer::from_yaml(&dir.join("config.yaml")).unwrap();
        assert!(layer.is_empty());
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".canopy");
        execute(false, &dir, quiet()).unwrap();

        let err = execute(false, &dir, quiet()).unwrap_err();
        assert!(matches!(err, CanopyError::AlreadyInitialized { .. }));
    }

    #[test]
    fn test_init_force_rewrites_config() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".canopy");
        execute(false, &dir, quiet()).unwrap();
        fs::write(dir.join("config.yaml"), "sort:\n  field: key\n").unwrap();

        execute(true, &dir, quiet()).unwrap();
        let content = fs::read_to_string(dir.join("config.yaml")).unwrap();
        assert_eq!(content, CONFIG_TEMPLATE);
    }

    #[test]
    fn test_gitignore_excludes_state_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".canopy");
        execute(false, &dir, quiet()).unwrap();

        let content = fs::read_to_string(dir.join(".gitignore")).unwrap();
        assert!(content.contains("checkpoints.json"));
        assert!(content.contains("*.tmp"));
    }
}
