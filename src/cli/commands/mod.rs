//! Command implementations.

pub mod changes;
pub mod checkpoint;
pub mod completions;
pub mod config;
pub mod init;
pub mod recent;
pub mod stats;
pub mod tree;

use crate::changes::{ChangeTracker, TrackingSettings};
use crate::config::{CanopyConfig, CliOverrides, ConfigLayer, discover_canopy_dir, load_config};
use crate::error::{CanopyError, Result};
use crate::hierarchy::HierarchyOptions;
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use serde::Serialize;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
    pub no_color: bool,
}

impl OutputOptions {
    #[must_use]
    pub fn use_color(&self) -> bool {
        !self.no_color
            && !self.json
            && io::stdout().is_terminal()
            && colored::control::SHOULD_COLORIZE.should_colorize()
    }
}

/// Print a value as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub canopy_dir: Option<PathBuf>,
    pub layer: ConfigLayer,
    pub config: CanopyConfig,
}

impl CommandContext {
    /// Discover the state directory and merge all config layers.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is unreadable or holds an invalid
    /// value.
    pub fn load(overrides: &CliOverrides) -> Result<Self> {
        let canopy_dir = match &overrides.state_dir {
            Some(dir) if dir.is_dir() => Some(dir.clone()),
            _ => match discover_canopy_dir(None) {
                Ok(dir) => Some(dir),
                Err(CanopyError::NotInitialized) => None,
                Err(err) => return Err(err),
            },
        };
        let layer = load_config(canopy_dir.as_deref(), overrides)?;
        let config = CanopyConfig::from_layer(&layer)?;
        debug!(canopy_dir = ?canopy_dir, "Loaded configuration");
        Ok(Self {
            canopy_dir,
            layer,
            config,
        })
    }

    #[must_use]
    pub fn hierarchy_options(&self) -> HierarchyOptions {
        HierarchyOptions {
            epic_link_field: self.config.epic_link_field.clone(),
            sort: self.config.sort,
            ..HierarchyOptions::default()
        }
    }

    /// # Errors
    ///
    /// Returns `NotInitialized` without a state directory.
    pub fn state_dir(&self) -> Result<PathBuf> {
        self.config.resolve_state_dir(self.canopy_dir.as_deref())
    }

    /// Tracker backed by the state directory.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` without a state directory.
    pub fn open_tracker(&self) -> Result<ChangeTracker<JsonFileStore>> {
        let store = JsonFileStore::new(self.state_dir()?);
        Ok(ChangeTracker::load(store, self.config.tracking))
    }

    /// Tracker backed by the state directory when there is one; otherwise an
    /// in-memory tracker with detection turned off.
    ///
    /// Returns the tracker and whether its state persists.
    #[must_use]
    pub fn open_tracker_or_ephemeral(&self) -> (ChangeTracker<Box<dyn KeyValueStore>>, bool) {
        match self.state_dir() {
            Ok(dir) => {
                let store: Box<dyn KeyValueStore> = Box::new(JsonFileStore::new(dir));
                (ChangeTracker::load(store, self.config.tracking), true)
            }
            Err(_) => {
                debug!("No state directory; change tracking off for this run");
                let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
                let settings = TrackingSettings {
                    enabled: false,
                    ..self.config.tracking
                };
                (ChangeTracker::load(store, settings), false)
            }
        }
    }
}

/// Display a path relative to the CWD when possible.
#[must_use]
pub fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
