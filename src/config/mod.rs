//! Configuration management for `canopy`.
//!
//! Configuration sources and precedence (highest wins):
//! 1. CLI overrides
//! 2. Environment variables (`CANOPY_*`)
//! 3. Project config (.canopy/config.yaml)
//! 4. User config (~/.config/canopy/config.yaml)
//! 5. Defaults
//!
//! Every layer is a flat map of dotted keys (`sort.field`). YAML files are
//! flattened into that shape; keys are normalised to lowercase with `-`
//! separators so `epic_link_field` and `epic-link-field` are the same key.

use crate::changes::{ActivityPeriod, TrackingSettings};
use crate::error::{CanopyError, Result};
use crate::hierarchy::{SortConfig, SortDirection, SortField};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-project state directory.
pub const CANOPY_DIR_NAME: &str = ".canopy";
/// Environment variable that points straight at a state directory.
pub const CANOPY_DIR_ENV: &str = "CANOPY_DIR";

pub const KEY_EPIC_LINK_FIELD: &str = "epic-link-field";
pub const KEY_SORT_FIELD: &str = "sort.field";
pub const KEY_SORT_DIRECTION: &str = "sort.direction";
pub const KEY_TRACKING_ENABLED: &str = "tracking.enabled";
pub const KEY_ACTIVITY_PERIOD: &str = "tracking.activity-period";
pub const KEY_STATE_DIR: &str = "state-dir";

/// Keys `canopy` understands. Others are kept but ignored.
pub const KNOWN_KEYS: &[&str] = &[
    KEY_EPIC_LINK_FIELD,
    KEY_SORT_FIELD,
    KEY_SORT_DIRECTION,
    KEY_TRACKING_ENABLED,
    KEY_ACTIVITY_PERIOD,
    KEY_STATE_DIR,
];

/// Template written by `canopy init`.
pub const CONFIG_TEMPLATE: &str = r"# canopy project configuration
#
# Custom field that holds the epic key on stories (tracker specific).
# epic-link-field: customfield_10014
#
# sort:
#   field: hierarchy    # hierarchy, key, summary, status, priority, updated, created, assignee
#   direction: asc      # asc, desc
#
# tracking:
#   enabled: true
#   activity-period: 24h  # 24h, 7d, off
";

/// Discover the active `.canopy` directory.
///
/// Honors `CANOPY_DIR` when set, otherwise walks up from `start` (or CWD).
///
/// # Errors
///
/// Returns `NotInitialized` if no directory is found, or an I/O error if the
/// CWD cannot be read.
pub fn discover_canopy_dir(start: Option<&Path>) -> Result<PathBuf> {
    let env_override = env::var(CANOPY_DIR_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from);
    discover_canopy_dir_with_env(start, env_override.as_deref())
}

fn discover_canopy_dir_with_env(start: Option<&Path>, env_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = env_override {
        if path.is_dir() {
            return Ok(path.to_path_buf());
        }
    }

    let mut current = match start {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };

    loop {
        let candidate = current.join(CANOPY_DIR_NAME);
        if candidate.is_dir() {
            return Ok(candidate);
        }

        if !current.pop() {
            break;
        }
    }

    Err(CanopyError::NotInitialized)
}

/// One configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    values: HashMap<String, String>,
}

impl ConfigLayer {
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(normalize_key(key), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&normalize_key(key)).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All entries, sorted by key.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<&str, &str> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    /// Merge another layer on top of this one (higher precedence wins).
    pub fn merge_from(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Merge multiple layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Build a layer from a YAML file path. Missing files return empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let has_content = contents.lines().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        });
        if !has_content {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(layer_from_yaml_value(&value))
    }

    /// Build a layer from `CANOPY_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|name| env::var(name).ok())
    }

    fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut layer = Self::default();
        for key in KNOWN_KEYS {
            if let Some(value) = lookup(&env_var_name(key)) {
                layer.set(key, value);
            }
        }
        layer
    }
}

/// CLI overrides for config loading (optional).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub epic_link_field: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
    pub activity_period: Option<String>,
}

impl CliOverrides {
    #[must_use]
    pub fn as_layer(&self) -> ConfigLayer {
        let mut layer = ConfigLayer::default();

        if let Some(field) = &self.epic_link_field {
            layer.set(KEY_EPIC_LINK_FIELD, field.clone());
        }
        if let Some(path) = &self.state_dir {
            layer.set(KEY_STATE_DIR, path.to_string_lossy());
        }
        if let Some(field) = &self.sort_field {
            layer.set(KEY_SORT_FIELD, field.clone());
        }
        if let Some(direction) = &self.sort_direction {
            layer.set(KEY_SORT_DIRECTION, direction.clone());
        }
        if let Some(period) = &self.activity_period {
            layer.set(KEY_ACTIVITY_PERIOD, period.clone());
        }

        layer
    }
}

/// Load project config (.canopy/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(canopy_dir: &Path) -> Result<ConfigLayer> {
    ConfigLayer::from_yaml(&canopy_dir.join("config.yaml"))
}

/// Load user config (~/.config/canopy/config.yaml).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<ConfigLayer> {
    let Ok(home) = env::var("HOME") else {
        return Ok(ConfigLayer::default());
    };
    let path = Path::new(&home)
        .join(".config")
        .join("canopy")
        .join("config.yaml");
    ConfigLayer::from_yaml(&path)
}

/// Default config layer (lowest precedence).
#[must_use]
pub fn default_config_layer() -> ConfigLayer {
    let mut layer = ConfigLayer::default();
    layer.set(KEY_SORT_FIELD, SortField::default().as_str());
    layer.set(KEY_SORT_DIRECTION, SortDirection::default().as_str());
    layer.set(KEY_TRACKING_ENABLED, "true");
    layer.set(KEY_ACTIVITY_PERIOD, ActivityPeriod::default().as_str());
    layer
}

/// Load configuration with the standard precedence order.
///
/// `canopy_dir` is the discovered state directory, if any; without one the
/// project layer is skipped.
///
/// # Errors
///
/// Returns an error if any config file cannot be read or parsed.
pub fn load_config(canopy_dir: Option<&Path>, cli: &CliOverrides) -> Result<ConfigLayer> {
    let defaults = default_config_layer();
    let user = load_user_config()?;
    let project = match canopy_dir {
        Some(dir) => load_project_config(dir)?,
        None => ConfigLayer::default(),
    };
    let env_layer = ConfigLayer::from_env();
    let cli_layer = cli.as_layer();

    Ok(ConfigLayer::merge_layers(&[
        defaults, user, project, env_layer, cli_layer,
    ]))
}

/// Typed view of a merged layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanopyConfig {
    pub epic_link_field: Option<String>,
    pub sort: SortConfig,
    pub tracking: TrackingSettings,
    pub state_dir: Option<PathBuf>,
}

impl CanopyConfig {
    /// Parse the known keys out of `layer`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key when a value is invalid.
    pub fn from_layer(layer: &ConfigLayer) -> Result<Self> {
        let epic_link_field = non_empty(layer.get(KEY_EPIC_LINK_FIELD)).map(str::to_string);
        let state_dir = non_empty(layer.get(KEY_STATE_DIR)).map(PathBuf::from);

        let field = match non_empty(layer.get(KEY_SORT_FIELD)) {
            Some(value) => value.parse()?,
            None => SortField::default(),
        };
        let direction = match non_empty(layer.get(KEY_SORT_DIRECTION)) {
            Some(value) => value.parse()?,
            None => SortDirection::default(),
        };

        let enabled = match non_empty(layer.get(KEY_TRACKING_ENABLED)) {
            Some(value) => parse_bool(value).ok_or_else(|| {
                CanopyError::Config(format!("{KEY_TRACKING_ENABLED}: expected a boolean, got '{value}'"))
            })?,
            None => true,
        };
        let activity_period = match non_empty(layer.get(KEY_ACTIVITY_PERIOD)) {
            Some(value) => value.parse()?,
            None => ActivityPeriod::default(),
        };

        Ok(Self {
            epic_link_field,
            sort: SortConfig { field, direction },
            tracking: TrackingSettings {
                enabled,
                activity_period,
            },
            state_dir,
        })
    }

    /// Where tracker state lives: `state-dir` when set, else the discovered
    /// `.canopy` directory.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` when neither is available.
    pub fn resolve_state_dir(&self, discovered: Option<&Path>) -> Result<PathBuf> {
        self.state_dir
            .clone()
            .or_else(|| discovered.map(Path::to_path_buf))
            .ok_or(CanopyError::NotInitialized)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('_', "-")
}

/// `tracking.activity-period` → `CANOPY_TRACKING_ACTIVITY_PERIOD`.
fn env_var_name(key: &str) -> String {
    format!("CANOPY_{}", key.to_uppercase().replace(['.', '-'], "_"))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn layer_from_yaml_value(value: &serde_yaml::Value) -> ConfigLayer {
    let mut flat = HashMap::new();
    flatten_yaml(value, "", &mut flat);

    let mut layer = ConfigLayer::default();
    for (key, value) in flat {
        layer.set(&key, value);
    }
    layer
}

fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, out: &mut HashMap<String, String>) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (key, value) in map {
                let Some(key_str) = key.as_str() else {
                    continue;
                };
                let next_prefix = if prefix.is_empty() {
                    key_str.to_string()
                } else {
                    format!("{prefix}.{key_str}")
                };
                flatten_yaml(value, &next_prefix, out);
            }
        }
        serde_yaml::Value::Sequence(values) => {
            let joined = values
                .iter()
                .filter_map(yaml_scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        _ => {
            if let Some(value) = yaml_scalar_to_string(value) {
                out.insert(prefix.to_string(), value);
            }
        }
    }
}

fn yaml_scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Bool(v) => Some(v.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Null
        | serde_yaml::Value::Sequence(_)
        | serde_yaml::Value::Mapping(_) => None,
        serde_yaml::Value::Tagged(tagged) => yaml_scalar_to_string(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layer(pairs: &[(&str, &str)]) -> ConfigLayer {
        let mut layer = ConfigLayer::default();
        for (key, value) in pairs {
            layer.set(key, *value);
        }
        layer
    }

    #[test]
    fn merge_precedence_order() {
        let merged = ConfigLayer::merge_layers(&[
            default_config_layer(),
            layer(&[(KEY_SORT_FIELD, "key")]),
            layer(&[(KEY_SORT_FIELD, "summary")]),
            layer(&[(KEY_SORT_FIELD, "updated")]),
        ]);
        assert_eq!(merged.get(KEY_SORT_FIELD), Some("updated"));
        assert_eq!(merged.get(KEY_ACTIVITY_PERIOD), Some("24h"));
    }

    #[test]
    fn yaml_nested_keys_flatten_and_normalize() {
        let yaml = r"
epic_link_field: customfield_10014
sort:
  field: priority
  direction: desc
tracking:
  enabled: false
  activity_period: 7d
";
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).expect("parse yaml");
        let layer = layer_from_yaml_value(&value);
        assert_eq!(layer.get(KEY_EPIC_LINK_FIELD), Some("customfield_10014"));
        assert_eq!(layer.get(KEY_ACTIVITY_PERIOD), Some("7d"));

        let config = CanopyConfig::from_layer(&layer).expect("config");
        assert_eq!(config.sort.field, SortField::Priority);
        assert_eq!(config.sort.direction, SortDirection::Desc);
        assert!(!config.tracking.enabled);
        assert_eq!(config.tracking.activity_period, ActivityPeriod::Week);
    }

    #[test]
    fn template_parses_to_defaults() {
        let value: serde_yaml::Value = serde_yaml::from_str(CONFIG_TEMPLATE).expect("parse yaml");
        let config = CanopyConfig::from_layer(&layer_from_yaml_value(&value)).expect("config");
        assert_eq!(config, CanopyConfig::default());
    }

    #[test]
    fn env_names_map_to_keys() {
        assert_eq!(
            env_var_name(KEY_ACTIVITY_PERIOD),
            "CANOPY_TRACKING_ACTIVITY_PERIOD"
        );
        let layer = ConfigLayer::from_env_with(|name| match name {
            "CANOPY_EPIC_LINK_FIELD" => Some("customfield_1".to_string()),
            "CANOPY_SORT_DIRECTION" => Some("desc".to_string()),
            _ => None,
        });
        assert_eq!(layer.get(KEY_EPIC_LINK_FIELD), Some("customfield_1"));
        assert_eq!(layer.get(KEY_SORT_DIRECTION), Some("desc"));
        assert_eq!(layer.entries().len(), 2);
    }

    #[test]
    fn cli_overrides_layer() {
        let overrides = CliOverrides {
            epic_link_field: Some("customfield_2".to_string()),
            state_dir: Some(PathBuf::from("/tmp/state")),
            ..CliOverrides::default()
        };
        let config = CanopyConfig::from_layer(&overrides.as_layer()).expect("config");
        assert_eq!(config.epic_link_field.as_deref(), Some("customfield_2"));
        assert_eq!(
            config.resolve_state_dir(None).expect("state dir"),
            PathBuf::from("/tmp/state")
        );
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(
            CanopyConfig::from_layer(&layer(&[(KEY_SORT_FIELD, "colour")])),
            Err(CanopyError::InvalidSortField { .. })
        ));
        assert!(matches!(
            CanopyConfig::from_layer(&layer(&[(KEY_TRACKING_ENABLED, "maybe")])),
            Err(CanopyError::Config(_))
        ));
        assert!(matches!(
            CanopyConfig::from_layer(&layer(&[(KEY_ACTIVITY_PERIOD, "1y")])),
            Err(CanopyError::InvalidActivityPeriod { .. })
        ));
    }

    #[test]
    fn state_dir_requires_discovery_or_override() {
        let config = CanopyConfig::default();
        assert!(matches!(
            config.resolve_state_dir(None),
            Err(CanopyError::NotInitialized)
        ));
        assert_eq!(
            config
                .resolve_state_dir(Some(Path::new("/w/.canopy")))
                .expect("state dir"),
            PathBuf::from("/w/.canopy")
        );
    }

    #[test]
    fn discover_walks_up() {
        let temp = TempDir::new().expect("tempdir");
        let canopy_dir = temp.path().join(CANOPY_DIR_NAME);
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&canopy_dir).expect("create canopy dir");
        fs::create_dir_all(&nested).expect("create nested");

        let found = discover_canopy_dir_with_env(Some(&nested), None).expect("discover");
        assert_eq!(found, canopy_dir);
    }

    #[test]
    fn discover_prefers_env_override() {
        let temp = TempDir::new().expect("tempdir");
        let elsewhere = temp.path().join("elsewhere");
        fs::create_dir_all(&elsewhere).expect("create dir");

        let found =
            discover_canopy_dir_with_env(Some(temp.path()), Some(&elsewhere)).expect("discover");
        assert_eq!(found, elsewhere);
    }

    #[test]
    fn discover_fails_without_dir() {
        let temp = TempDir::new().expect("tempdir");
        let result = discover_canopy_dir_with_env(Some(temp.path()), None);
        assert!(matches!(result, Err(CanopyError::NotInitialized)));
    }
}
