//! `canopy config`: show the merged configuration and where each value
//! came from.

use super::{CommandContext, OutputOptions, display_path, print_json};
use crate::config::{
    CliOverrides, ConfigLayer, KNOWN_KEYS, default_config_layer, load_project_config,
    load_user_config,
};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ConfigSource {
    Default,
    User,
    Project,
    Environment,
    Cli,
}

impl ConfigSource {
    const fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::User => "user config",
            Self::Project => ".canopy/config",
            Self::Environment => "environment",
            Self::Cli => "cli",
        }
    }
}

#[derive(Debug, Serialize)]
struct ConfigEntry {
    value: String,
    source: ConfigSource,
    known: bool,
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    state_dir: Option<PathBuf>,
    values: BTreeMap<String, ConfigEntry>,
}

/// Execute the config command.
///
/// # Errors
///
/// Returns an error if a config file cannot be parsed or holds an invalid
/// value.
pub fn execute(output: OutputOptions, overrides: &CliOverrides) -> Result<()> {
    let ctx = CommandContext::load(overrides)?;

    let project = match ctx.canopy_dir.as_deref() {
        Some(dir) => load_project_config(dir)?,
        None => ConfigLayer::default(),
    };
    let layers = [
        (ConfigSource::Default, default_config_layer()),
        (ConfigSource::User, load_user_config()?),
        (ConfigSource::Project, project),
        (ConfigSource::Environment, ConfigLayer::from_env()),
        (ConfigSource::Cli, overrides.as_layer()),
    ];

    let report = ConfigOutput {
        state_dir: ctx.state_dir().ok(),
        values: attribute(&layers),
    };

    if output.json {
        return print_json(&report);
    }

    match &report.state_dir {
        Some(dir) => println!("state-dir: {}", display_path(dir)),
        None => println!("state-dir: (none; run `canopy init`)"),
    }
    for (key, entry) in &report.values {
        let unknown = if entry.known { "" } else { "  (unknown key)" };
        println!("{key} = {}  [{}]{unknown}", entry.value, entry.source.label());
    }
    Ok(())
}

/// Merge layers in precedence order, remembering which layer won each key.
fn attribute(layers: &[(ConfigSource, ConfigLayer)]) -> BTreeMap<String, ConfigEntry> {
    let mut values = BTreeMap::new();
    for (source, layer) in layers {
        for (key, value) in layer.entries() {
            values.insert(
                key.to_string(),
                ConfigEntry {
                    value: value.to_string(),
                    source: *source,
                    known: KNOWN_KEYS.contains(&key),
                },
            );
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KEY_SORT_DIRECTION, KEY_SORT_FIELD};

    #[test]
    fn test_later_layers_win_and_are_attributed() {
        let mut project = ConfigLayer::default();
        project.set(KEY_SORT_FIELD, "key");
        project.set("colour", "blue");
        let mut cli = ConfigLayer::default();
        cli.set(KEY_SORT_FIELD, "updated");

        let values = attribute(&[
            (ConfigSource::Default, default_config_layer()),
            (ConfigSource::Project, project),
            (ConfigSource::Cli, cli),
        ]);

        let sort = &values[KEY_SORT_FIELD];
        assert_eq!(sort.value, "updated");
        assert_eq!(sort.source, ConfigSource::Cli);
        assert_eq!(values[KEY_SORT_DIRECTION].source, ConfigSource::Default);
        assert!(!values["colour"].known);
    }
}
